mod draft;
mod field;
mod ids;
mod lesson;

pub use draft::{LessonDraft, LessonDraftError, ValidatedDraft};
pub use field::{validate_text, FieldEdit, FieldEditError, FieldValue, LessonField, MAX_TEXT_LEN};
pub use ids::{ParseIdError, RowIndex, StepName};
pub use lesson::{Lesson, LessonError, LessonFields, StepMap, UNASSIGNED};
