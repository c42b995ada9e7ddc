use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of assignee and title text, in characters.
pub const MAX_TEXT_LEN: usize = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldEditError {
    #[error("{0} cannot be empty")]
    Empty(LessonField),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: LessonField, max: usize },

    #[error("{0} expects a date")]
    ExpectedDate(LessonField),

    #[error("{0} expects text")]
    ExpectedText(LessonField),

    #[error("unknown field: {0}")]
    UnknownField(String),
}

//
// ─── FIELD ─────────────────────────────────────────────────────────────────────
//

/// Editable scalar attribute of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LessonField {
    Assignee,
    Title,
    StartDate,
    DueDate,
    ReleaseDate,
}

impl LessonField {
    /// Wire name of the field.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            LessonField::Assignee => "assignee",
            LessonField::Title => "title",
            LessonField::StartDate => "startDate",
            LessonField::DueDate => "dueDate",
            LessonField::ReleaseDate => "releaseDate",
        }
    }

    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, LessonField::Assignee | LessonField::Title)
    }
}

impl fmt::Display for LessonField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LessonField {
    type Err = FieldEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assignee" => Ok(Self::Assignee),
            "title" => Ok(Self::Title),
            "startDate" | "start" => Ok(Self::StartDate),
            "dueDate" | "due" => Ok(Self::DueDate),
            "releaseDate" | "release" => Ok(Self::ReleaseDate),
            other => Err(FieldEditError::UnknownField(other.to_owned())),
        }
    }
}

/// Value held by a [`LessonField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Date(Option<NaiveDate>),
}

//
// ─── FIELD EDIT ────────────────────────────────────────────────────────────────
//

/// A validated inline edit, ready to dispatch.
///
/// Text is trimmed and must be non-empty; dates may be cleared with `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEdit {
    field: LessonField,
    value: FieldValue,
}

impl FieldEdit {
    /// Validate a new value for `field`.
    ///
    /// # Errors
    ///
    /// - `Empty` / `TooLong` for invalid text
    /// - `ExpectedDate` / `ExpectedText` if the value kind does not match the field
    pub fn new(field: LessonField, value: FieldValue) -> Result<Self, FieldEditError> {
        let value = match (field.is_text(), value) {
            (true, FieldValue::Text(text)) => FieldValue::Text(validate_text(field, &text)?),
            (true, FieldValue::Date(_)) => return Err(FieldEditError::ExpectedText(field)),
            (false, FieldValue::Date(date)) => FieldValue::Date(date),
            (false, FieldValue::Text(_)) => return Err(FieldEditError::ExpectedDate(field)),
        };
        Ok(Self { field, value })
    }

    #[must_use]
    pub fn field(&self) -> LessonField {
        self.field
    }

    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// Trim and bound-check a required text value.
///
/// # Errors
///
/// Returns `Empty` for blank text and `TooLong` past [`MAX_TEXT_LEN`].
pub fn validate_text(field: LessonField, raw: &str) -> Result<String, FieldEditError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FieldEditError::Empty(field));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(FieldEditError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_edit_is_trimmed() {
        let edit = FieldEdit::new(LessonField::Title, FieldValue::Text("  Lesson 03 ".into()))
            .unwrap();
        assert_eq!(edit.value(), &FieldValue::Text("Lesson 03".into()));
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = FieldEdit::new(LessonField::Assignee, FieldValue::Text("   ".into()))
            .unwrap_err();
        assert_eq!(err, FieldEditError::Empty(LessonField::Assignee));
    }

    #[test]
    fn long_text_is_rejected() {
        let err = FieldEdit::new(LessonField::Title, FieldValue::Text("x".repeat(101)))
            .unwrap_err();
        assert_eq!(
            err,
            FieldEditError::TooLong {
                field: LessonField::Title,
                max: MAX_TEXT_LEN
            }
        );
    }

    #[test]
    fn date_field_accepts_clear() {
        let edit = FieldEdit::new(LessonField::DueDate, FieldValue::Date(None)).unwrap();
        assert_eq!(edit.field(), LessonField::DueDate);
        assert_eq!(edit.value(), &FieldValue::Date(None));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        assert_eq!(
            FieldEdit::new(LessonField::DueDate, FieldValue::Text("x".into())).unwrap_err(),
            FieldEditError::ExpectedDate(LessonField::DueDate)
        );
        assert_eq!(
            FieldEdit::new(LessonField::Title, FieldValue::Date(None)).unwrap_err(),
            FieldEditError::ExpectedText(LessonField::Title)
        );
    }

    #[test]
    fn parses_short_and_wire_names() {
        assert_eq!("due".parse::<LessonField>().unwrap(), LessonField::DueDate);
        assert_eq!("releaseDate".parse::<LessonField>().unwrap(), LessonField::ReleaseDate);
        assert!("owner".parse::<LessonField>().is_err());
    }
}
