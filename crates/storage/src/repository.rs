use async_trait::async_trait;
use lesson_core::model::{
    FieldValue, Lesson, LessonError, LessonField, LessonFields, RowIndex, StepMap, StepName,
    ValidatedDraft,
};
use lesson_core::pipeline::{Phase, PipelineDefinition};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The backend could not be reached or did not answer in time.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an explicit error payload.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Raw lesson shape exchanged with a backend, before pipeline validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRecord {
    pub row_index: RowIndex,
    pub fields: LessonFields,
    pub pre_steps: StepMap,
    pub post_steps: StepMap,
}

impl LessonRecord {
    /// Convert the record into a domain `Lesson`, recomputing progress.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if a step is not part of the pipeline.
    pub fn into_lesson(self, pipeline: &PipelineDefinition) -> Result<Lesson, LessonError> {
        Lesson::new(
            pipeline,
            self.row_index,
            self.fields,
            self.pre_steps,
            self.post_steps,
        )
    }
}

/// Acknowledgment of a lesson creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAck {
    pub row_index: RowIndex,
    /// Link to the working folder the backend prepared for the lesson.
    pub folder_url: Option<String>,
    /// The row was created but the working folder was not.
    pub folder_error: Option<String>,
}

/// Contract of the remote lesson store.
///
/// The backend is the sole source of truth; every call may fail with
/// `StorageError::Transport` or `StorageError::Backend`.
#[async_trait]
pub trait LessonBackend: Send + Sync {
    /// Fetch the full lesson snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be fetched or decoded.
    async fn fetch_all(&self) -> Result<Vec<LessonRecord>, StorageError>;

    /// Set a step flag of one lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update is not acknowledged.
    async fn mutate_step(
        &self,
        row: RowIndex,
        step: &StepName,
        value: bool,
    ) -> Result<(), StorageError>;

    /// Replace a scalar field of one lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update is not acknowledged.
    async fn mutate_field(
        &self,
        row: RowIndex,
        field: LessonField,
        value: &FieldValue,
    ) -> Result<(), StorageError>;

    /// Register a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson is not created.
    async fn create_lesson(&self, draft: &ValidatedDraft) -> Result<CreateAck, StorageError>;

    /// Remove a lesson row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deletion is not acknowledged.
    async fn delete_lesson(&self, row: RowIndex) -> Result<(), StorageError>;

    /// Ask the backend to notify reviewers about a gate step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the request is not acknowledged.
    async fn request_review(&self, row: RowIndex, step: &StepName) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// First data row of the sheet; row 1 holds the column headers.
pub const FIRST_ROW: u64 = 2;

/// A call received by [`InMemoryBackend`], recorded for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    FetchAll,
    MutateStep {
        row: RowIndex,
        step: StepName,
        value: bool,
    },
    MutateField {
        row: RowIndex,
        field: LessonField,
        value: FieldValue,
    },
    CreateLesson {
        title: String,
    },
    DeleteLesson {
        row: RowIndex,
    },
    RequestReview {
        row: RowIndex,
        step: StepName,
    },
}

/// Failure to inject into the next call of an [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    Transport,
    Backend(String),
}

impl InjectedFailure {
    fn into_error(self) -> StorageError {
        match self {
            InjectedFailure::Transport => StorageError::Transport("connection refused".into()),
            InjectedFailure::Backend(message) => StorageError::Backend(message),
        }
    }
}

#[derive(Default)]
struct InMemoryState {
    rows: BTreeMap<RowIndex, LessonRecord>,
    failures: VecDeque<InjectedFailure>,
    calls: Vec<BackendCall>,
}

/// Sheet-like in-memory backend for tests, demos and prototyping.
///
/// Rows behave like spreadsheet rows: deleting one shifts every later row up
/// by one, so row handles from an older snapshot go stale.
#[derive(Clone)]
pub struct InMemoryBackend {
    pipeline: Arc<PipelineDefinition>,
    state: Arc<Mutex<InMemoryState>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Arc::new(PipelineDefinition::standard()))
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(pipeline: Arc<PipelineDefinition>) -> Self {
        Self {
            pipeline,
            state: Arc::new(Mutex::new(InMemoryState::default())),
        }
    }

    /// Seed rows, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state lock is poisoned.
    pub fn seed(&self, records: Vec<LessonRecord>) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.rows = records
            .into_iter()
            .map(|record| (record.row_index, record))
            .collect();
        Ok(())
    }

    /// Make the next call fail with `failure`. Queued failures are consumed in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state lock is poisoned.
    pub fn fail_next(&self, failure: InjectedFailure) -> Result<(), StorageError> {
        self.lock()?.failures.push_back(failure);
        Ok(())
    }

    /// Calls received so far, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state lock is poisoned.
    pub fn calls(&self) -> Result<Vec<BackendCall>, StorageError> {
        Ok(self.lock()?.calls.clone())
    }

    /// Current content of a row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state lock is poisoned.
    pub fn record(&self, row: RowIndex) -> Result<Option<LessonRecord>, StorageError> {
        Ok(self.lock()?.rows.get(&row).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Transport(e.to_string()))
    }

    /// Record the call and consume a pending injected failure, if any.
    fn begin(&self, call: BackendCall) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        let mut guard = self.lock()?;
        guard.calls.push(call);
        if let Some(failure) = guard.failures.pop_front() {
            return Err(failure.into_error());
        }
        Ok(guard)
    }
}

fn missing_row(row: RowIndex) -> StorageError {
    StorageError::Backend(format!("row {row} not found"))
}

#[async_trait]
impl LessonBackend for InMemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<LessonRecord>, StorageError> {
        let guard = self.begin(BackendCall::FetchAll)?;
        Ok(guard.rows.values().cloned().collect())
    }

    async fn mutate_step(
        &self,
        row: RowIndex,
        step: &StepName,
        value: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.begin(BackendCall::MutateStep {
            row,
            step: step.clone(),
            value,
        })?;
        let phase = self
            .pipeline
            .phase_of(step.as_str())
            .ok_or_else(|| StorageError::Backend(format!("unknown column: {step}")))?;
        let record = guard.rows.get_mut(&row).ok_or_else(|| missing_row(row))?;
        let map = match phase {
            Phase::Pre => &mut record.pre_steps,
            Phase::Post => &mut record.post_steps,
        };
        map.insert(step.clone(), value);
        Ok(())
    }

    async fn mutate_field(
        &self,
        row: RowIndex,
        field: LessonField,
        value: &FieldValue,
    ) -> Result<(), StorageError> {
        let mut guard = self.begin(BackendCall::MutateField {
            row,
            field,
            value: value.clone(),
        })?;
        let record = guard.rows.get_mut(&row).ok_or_else(|| missing_row(row))?;
        let fields = &mut record.fields;
        match (field, value.clone()) {
            (LessonField::Assignee, FieldValue::Text(text)) => fields.assignee = text,
            (LessonField::Title, FieldValue::Text(text)) => fields.title = text,
            (LessonField::StartDate, FieldValue::Date(date)) => fields.start_date = date,
            (LessonField::DueDate, FieldValue::Date(date)) => fields.due_date = date,
            (LessonField::ReleaseDate, FieldValue::Date(date)) => fields.release_date = date,
            (field, _) => {
                return Err(StorageError::Backend(format!("invalid value for {field}")));
            }
        }
        Ok(())
    }

    async fn create_lesson(&self, draft: &ValidatedDraft) -> Result<CreateAck, StorageError> {
        let mut guard = self.begin(BackendCall::CreateLesson {
            title: draft.fields.title.clone(),
        })?;
        let row_index = guard
            .rows
            .keys()
            .next_back()
            .map_or(RowIndex::new(FIRST_ROW), |last| RowIndex::new(last.value() + 1));
        guard.rows.insert(
            row_index,
            LessonRecord {
                row_index,
                fields: draft.fields.clone(),
                pre_steps: draft.pre_steps.clone(),
                post_steps: draft.post_steps.clone(),
            },
        );
        Ok(CreateAck {
            row_index,
            folder_url: None,
            folder_error: None,
        })
    }

    async fn delete_lesson(&self, row: RowIndex) -> Result<(), StorageError> {
        let mut guard = self.begin(BackendCall::DeleteLesson { row })?;
        if guard.rows.remove(&row).is_none() {
            return Err(missing_row(row));
        }
        let shifted: Vec<LessonRecord> = guard
            .rows
            .split_off(&row)
            .into_values()
            .map(|mut record| {
                record.row_index = RowIndex::new(record.row_index.value() - 1);
                record
            })
            .collect();
        for record in shifted {
            guard.rows.insert(record.row_index, record);
        }
        Ok(())
    }

    async fn request_review(&self, row: RowIndex, step: &StepName) -> Result<(), StorageError> {
        let guard = self.begin(BackendCall::RequestReview {
            row,
            step: step.clone(),
        })?;
        if !guard.rows.contains_key(&row) {
            return Err(missing_row(row));
        }
        if !self.pipeline.is_review_gate(step.as_str()) {
            return Err(StorageError::Backend(format!("{step} is not a review step")));
        }
        Ok(())
    }
}

/// Backend handle shared by services.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonBackend>,
}

impl Storage {
    #[must_use]
    pub fn in_memory(pipeline: Arc<PipelineDefinition>) -> (Self, InMemoryBackend) {
        let backend = InMemoryBackend::new(pipeline);
        let lessons: Arc<dyn LessonBackend> = Arc::new(backend.clone());
        (Self { lessons }, backend)
    }

    /// Storage backed by the HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Transport` if the HTTP client cannot be built.
    pub fn http(
        config: crate::http::HttpBackendConfig,
        pipeline: Arc<PipelineDefinition>,
    ) -> Result<Self, StorageError> {
        let lessons: Arc<dyn LessonBackend> =
            Arc::new(crate::http::HttpBackend::new(config, pipeline)?);
        Ok(Self { lessons })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::LessonDraft;

    fn record(row: u64, title: &str) -> LessonRecord {
        LessonRecord {
            row_index: RowIndex::new(row),
            fields: LessonFields {
                assignee: "Aoi".into(),
                title: title.into(),
                ..LessonFields::default()
            },
            pre_steps: StepMap::new(),
            post_steps: StepMap::new(),
        }
    }

    #[tokio::test]
    async fn mutate_step_updates_the_right_phase() {
        let backend = InMemoryBackend::default();
        backend.seed(vec![record(2, "L1")]).unwrap();

        backend
            .mutate_step(RowIndex::new(2), &StepName::new("Thumbnail Check"), true)
            .await
            .unwrap();

        let stored = backend.record(RowIndex::new(2)).unwrap().unwrap();
        assert_eq!(stored.post_steps.get("Thumbnail Check"), Some(&true));
        assert!(stored.pre_steps.is_empty());
    }

    #[tokio::test]
    async fn delete_shifts_later_rows_up() {
        let backend = InMemoryBackend::default();
        backend
            .seed(vec![record(2, "L1"), record(3, "L2"), record(4, "L3")])
            .unwrap();

        backend.delete_lesson(RowIndex::new(3)).await.unwrap();

        let rows = backend.fetch_all().await.unwrap();
        let titles: Vec<_> = rows
            .iter()
            .map(|r| (r.row_index.value(), r.fields.title.as_str()))
            .collect();
        assert_eq!(titles, vec![(2, "L1"), (3, "L3")]);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let backend = InMemoryBackend::default();
        backend.seed(vec![record(2, "L1")]).unwrap();
        backend
            .fail_next(InjectedFailure::Backend("sheet locked".into()))
            .unwrap();

        let err = backend
            .mutate_step(RowIndex::new(2), &StepName::new("Kickoff"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(msg) if msg == "sheet locked"));

        backend
            .mutate_step(RowIndex::new(2), &StepName::new("Kickoff"), true)
            .await
            .unwrap();
        assert_eq!(backend.calls().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_appends_after_last_row() {
        let pipeline = PipelineDefinition::standard();
        let backend = InMemoryBackend::default();
        backend.seed(vec![record(2, "L1"), record(5, "L2")]).unwrap();

        let draft = LessonDraft::new("Ren", "L3").validate(&pipeline).unwrap();
        let ack = backend.create_lesson(&draft).await.unwrap();

        assert_eq!(ack.row_index, RowIndex::new(6));
        let lesson = backend
            .record(ack.row_index)
            .unwrap()
            .unwrap()
            .into_lesson(&pipeline)
            .unwrap();
        assert_eq!(lesson.title(), "L3");
    }

    #[tokio::test]
    async fn review_request_requires_gate_step() {
        let backend = InMemoryBackend::default();
        backend.seed(vec![record(2, "L1")]).unwrap();

        backend
            .request_review(RowIndex::new(2), &StepName::new("Script Review"))
            .await
            .unwrap();
        let err = backend
            .request_review(RowIndex::new(2), &StepName::new("Kickoff"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[test]
    fn record_converts_to_lesson_with_progress() {
        let pipeline = PipelineDefinition::standard();
        let mut original = record(7, "L7");
        original.pre_steps.insert(StepName::new("Kickoff"), true);

        let lesson = original.into_lesson(&pipeline).unwrap();

        assert_eq!(lesson.row_index(), RowIndex::new(7));
        assert!(lesson.is_checked(Phase::Pre, "Kickoff"));
        assert!(lesson.progress().overall > 0);
    }
}
