//! JSON shapes exchanged with the spreadsheet endpoint.

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use lesson_core::model::{FieldValue, LessonField, LessonFields, RowIndex, StepMap, StepName};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::repository::{CreateAck, LessonRecord, StorageError};

const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

/// Body of a mutation `POST`, tagged by `action`.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WireRequest {
    UpdateCheckbox {
        row_index: u64,
        column_name: String,
        value: bool,
    },
    UpdateField {
        row_index: u64,
        field: &'static str,
        value: String,
    },
    AddLesson {
        assignee: String,
        title: String,
        start_date: String,
        due_date: String,
        release_date: String,
        steps: Vec<String>,
    },
    DeleteLesson {
        row_index: u64,
    },
    RequestReview {
        row_index: u64,
        column_name: String,
    },
}

impl WireRequest {
    #[must_use]
    pub fn update_checkbox(row: RowIndex, step: &StepName, value: bool) -> Self {
        Self::UpdateCheckbox {
            row_index: row.value(),
            column_name: step.as_str().to_owned(),
            value,
        }
    }

    #[must_use]
    pub fn update_field(row: RowIndex, field: LessonField, value: &FieldValue) -> Self {
        Self::UpdateField {
            row_index: row.value(),
            field: field.key(),
            value: field_value_text(value),
        }
    }

    #[must_use]
    pub fn add_lesson(fields: &LessonFields, steps: Vec<StepName>) -> Self {
        Self::AddLesson {
            assignee: fields.assignee.clone(),
            title: fields.title.clone(),
            start_date: format_date(fields.start_date),
            due_date: format_date(fields.due_date),
            release_date: format_date(fields.release_date),
            steps: steps.into_iter().map(|s| s.as_str().to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            WireRequest::UpdateCheckbox { .. } => "updateCheckbox",
            WireRequest::UpdateField { .. } => "updateField",
            WireRequest::AddLesson { .. } => "addLesson",
            WireRequest::DeleteLesson { .. } => "deleteLesson",
            WireRequest::RequestReview { .. } => "requestReview",
        }
    }
}

/// Dates travel as `YYYY-MM-DD`; an unset date is the empty string.
#[must_use]
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(WIRE_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn field_value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Date(date) => format_date(*date),
    }
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

/// Reply to `?action=getAll`.
#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    #[serde(default)]
    pub lessons: Option<Vec<WireLesson>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SnapshotResponse {
    /// Unwrap the envelope into records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` for an error envelope.
    pub fn into_records(self) -> Result<Vec<LessonRecord>, StorageError> {
        if let Some(message) = self.error {
            return Err(StorageError::Backend(message));
        }
        Ok(self
            .lessons
            .unwrap_or_default()
            .into_iter()
            .map(WireLesson::into_record)
            .collect())
    }
}

/// Lesson row as served by the endpoint. Extra keys such as a server-side
/// progress object are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLesson {
    pub row_index: u64,
    #[serde(default, alias = "担当者名")]
    pub assignee: String,
    #[serde(default, alias = "レッスン名")]
    pub title: String,
    #[serde(default, alias = "開始日", deserialize_with = "de_wire_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "納期", deserialize_with = "de_wire_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, alias = "リリース日", deserialize_with = "de_wire_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, alias = "前工程")]
    pub pre_steps: BTreeMap<String, WireFlag>,
    #[serde(default, alias = "後工程")]
    pub post_steps: BTreeMap<String, WireFlag>,
}

impl WireLesson {
    #[must_use]
    pub fn into_record(self) -> LessonRecord {
        LessonRecord {
            row_index: RowIndex::new(self.row_index),
            fields: LessonFields {
                assignee: self.assignee.trim().to_owned(),
                title: self.title.trim().to_owned(),
                start_date: self.start_date,
                due_date: self.due_date,
                release_date: self.release_date,
            },
            pre_steps: step_map(self.pre_steps),
            post_steps: step_map(self.post_steps),
        }
    }
}

fn step_map(raw: BTreeMap<String, WireFlag>) -> StepMap {
    raw.into_iter()
        .map(|(name, flag)| (StepName::new(name), flag.is_set()))
        .collect()
}

/// Checkbox cell: a JSON bool, or the sheet's `"TRUE"`/`"FALSE"` text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireFlag {
    Bool(bool),
    Text(String),
}

impl WireFlag {
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            WireFlag::Bool(value) => *value,
            WireFlag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Reply to a mutation `POST`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub row_index: Option<u64>,
    #[serde(default)]
    pub folder_url: Option<String>,
    #[serde(default)]
    pub folder_error: Option<String>,
}

impl AckResponse {
    /// # Errors
    ///
    /// Returns `StorageError::Backend` for an error envelope.
    pub fn check(self) -> Result<Self, StorageError> {
        match self.error {
            Some(message) => Err(StorageError::Backend(message)),
            None => Ok(self),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` when the row index is missing.
    pub fn into_create_ack(self) -> Result<CreateAck, StorageError> {
        let row_index = self
            .row_index
            .ok_or_else(|| StorageError::Serialization("addLesson reply without rowIndex".into()))?;
        Ok(CreateAck {
            row_index: RowIndex::new(row_index),
            folder_url: self.folder_url.filter(|url| !url.is_empty()),
            folder_error: self.folder_error.filter(|msg| !msg.is_empty()),
        })
    }
}

//
// ─── DATES ─────────────────────────────────────────────────────────────────────
//

/// Parse a wire date in the local time zone: `YYYY-MM-DD`, an RFC 3339
/// timestamp, or empty for unset.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for anything else.
pub fn parse_wire_date(raw: &str) -> Result<Option<NaiveDate>, StorageError> {
    parse_wire_date_in(raw, &Local)
}

/// Parse a wire date, reading timestamps as calendar days in `tz`.
///
/// The sheet serializes a date cell as midnight of the sheet's zone converted
/// to UTC, so `2024-05-09T15:00:00.000Z` is 2024-05-10 in UTC+9.
///
/// # Errors
///
/// Returns `StorageError::Serialization` when the value is neither a date nor
/// a timestamp.
pub fn parse_wire_date_in<Tz: TimeZone>(
    raw: &str,
    tz: &Tz,
) -> Result<Option<NaiveDate>, StorageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid =
        |e: chrono::ParseError| StorageError::Serialization(format!("invalid date {raw:?}: {e}"));
    if raw.len() == 10 {
        return NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT)
            .map(Some)
            .map_err(invalid);
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Ok(Some(at.with_timezone(tz).date_naive())),
        // Timestamp without an offset: already a wall-clock date.
        Err(_) => {
            let prefix = raw.get(..10).unwrap_or(raw);
            NaiveDate::parse_from_str(prefix, WIRE_DATE_FORMAT)
                .map(Some)
                .map_err(invalid)
        }
    }
}

fn de_wire_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_wire_date(&raw).map_err(serde::de::Error::custom),
    }
}
