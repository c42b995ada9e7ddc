//! Presentation-ready shapes derived from the lesson collection.

mod card;
mod filter;
mod matrix;
mod summary;

pub use card::{DelayBanner, LessonCard, StepCheck};
pub use filter::{assignee_options, AssigneeFilter};
pub use matrix::{MatrixCell, MatrixRow, MatrixSort, StepMatrix};
pub use summary::DashboardSummary;
