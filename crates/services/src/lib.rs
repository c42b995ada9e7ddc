#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod mutation;
pub mod narrative;
pub mod session;
pub mod views;

pub use lesson_core::Clock;

pub use error::SessionError;
pub use mutation::{Cell, CellKey, CellValue, Command, MutationId, PendingMutation, RemoteCall};
pub use narrative::compose_narrative;
pub use session::{
    CreateOutcome, Dispatched, LessonSession, MutationOutcome, Notice, NoticeLevel, SessionEvent,
    SessionObserver, Settled,
};
