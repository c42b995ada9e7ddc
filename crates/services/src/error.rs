//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{FieldEditError, LessonDraftError, LessonError, RowIndex, StepName};
use storage::repository::StorageError;

/// Errors emitted by `LessonSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no lesson at row {0}")]
    UnknownLesson(RowIndex),
    #[error("{0} does not accept review requests")]
    NotReviewGate(StepName),
    #[error("snapshot contains row {0} more than once")]
    DuplicateRow(RowIndex),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Draft(#[from] LessonDraftError),
    #[error(transparent)]
    FieldEdit(#[from] FieldEditError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
