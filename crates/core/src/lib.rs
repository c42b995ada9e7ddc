#![forbid(unsafe_code)]

pub mod classify;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod time;

pub use classify::{classify, detect_delay, DelayVerdict, LessonStatus};
pub use pipeline::{Phase, PipelineDefinition};
pub use progress::{compute_progress, next_pending_step, PipelineStep, Progress};
pub use time::Clock;
