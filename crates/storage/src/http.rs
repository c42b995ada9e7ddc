use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lesson_core::model::{FieldValue, LessonField, RowIndex, StepName, ValidatedDraft};
use lesson_core::pipeline::PipelineDefinition;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::repository::{CreateAck, LessonBackend, LessonRecord, StorageError};
use crate::wire::{AckResponse, SnapshotResponse, WireRequest};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `LESSONS_BACKEND_URL` and `LESSONS_TIMEOUT_SECS`.
    ///
    /// Returns `None` when no endpoint is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LESSONS_BACKEND_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let timeout = env::var("LESSONS_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Some(Self {
            base_url: base_url.trim().to_owned(),
            timeout,
        })
    }
}

/// Backend talking to the spreadsheet web endpoint.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
    pipeline: Arc<PipelineDefinition>,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `StorageError::Transport` if the HTTP client cannot be built.
    pub fn new(
        config: HttpBackendConfig,
        pipeline: Arc<PipelineDefinition>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            config,
            pipeline,
        })
    }

    /// `addLesson` body; initial steps are listed in pipeline order.
    fn add_lesson_request(&self, draft: &ValidatedDraft) -> WireRequest {
        WireRequest::add_lesson(&draft.fields, draft.initial_steps(&self.pipeline))
    }

    async fn post(&self, request: WireRequest) -> Result<AckResponse, StorageError> {
        let body =
            serde_json::to_string(&request).map_err(|e| StorageError::Serialization(e.to_string()))?;
        tracing::debug!(action = request.action(), "posting mutation");

        let response = self
            .client
            .post(&self.config.base_url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        let ack: AckResponse = decode(response).await?;
        ack.check()
    }
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Transport(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    let status = response.status();
    if !status.is_success() {
        return Err(StorageError::Transport(format!("server responded {status}")));
    }
    let text = response.text().await.map_err(transport)?;
    serde_json::from_str(&text).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl LessonBackend for HttpBackend {
    async fn fetch_all(&self) -> Result<Vec<LessonRecord>, StorageError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("action", "getAll")])
            .send()
            .await
            .map_err(transport)?;
        let snapshot: SnapshotResponse = decode(response).await?;
        let records = snapshot.into_records()?;
        tracing::debug!(count = records.len(), "fetched snapshot");
        Ok(records)
    }

    async fn mutate_step(
        &self,
        row: RowIndex,
        step: &StepName,
        value: bool,
    ) -> Result<(), StorageError> {
        self.post(WireRequest::update_checkbox(row, step, value))
            .await
            .map(|_| ())
    }

    async fn mutate_field(
        &self,
        row: RowIndex,
        field: LessonField,
        value: &FieldValue,
    ) -> Result<(), StorageError> {
        self.post(WireRequest::update_field(row, field, value))
            .await
            .map(|_| ())
    }

    async fn create_lesson(&self, draft: &ValidatedDraft) -> Result<CreateAck, StorageError> {
        self.post(self.add_lesson_request(draft))
            .await?
            .into_create_ack()
    }

    async fn delete_lesson(&self, row: RowIndex) -> Result<(), StorageError> {
        self.post(WireRequest::DeleteLesson {
            row_index: row.value(),
        })
        .await
        .map(|_| ())
    }

    async fn request_review(&self, row: RowIndex, step: &StepName) -> Result<(), StorageError> {
        self.post(WireRequest::RequestReview {
            row_index: row.value(),
            column_name: step.as_str().to_owned(),
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::LessonDraft;

    fn backend(url: &str) -> HttpBackend {
        let mut config = HttpBackendConfig::new(url);
        config.timeout = Duration::from_millis(500);
        HttpBackend::new(config, Arc::new(PipelineDefinition::standard())).unwrap()
    }

    #[test]
    fn add_lesson_lists_steps_in_pipeline_order() {
        let backend = backend("http://127.0.0.1:9/exec");
        let mut draft = LessonDraft::new("Aoi", "Shading");
        draft.initial_steps = vec![
            StepName::new("Research"),
            StepName::new("Kickoff"),
            StepName::new("Outline Draft"),
        ];
        let validated = draft.validate(&backend.pipeline).unwrap();

        let WireRequest::AddLesson { steps, .. } = backend.add_lesson_request(&validated) else {
            panic!("expected addLesson");
        };
        assert_eq!(steps, vec!["Kickoff", "Research", "Outline Draft"]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let backend = backend("http://127.0.0.1:9/exec");

        let err = backend.fetch_all().await.unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
    }
}
