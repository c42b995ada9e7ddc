pub mod demo;
pub mod http;
pub mod repository;
pub mod wire;

pub use demo::demo_records;
pub use http::{HttpBackend, HttpBackendConfig};
pub use repository::{
    BackendCall, CreateAck, InMemoryBackend, InjectedFailure, LessonBackend, LessonRecord,
    Storage, StorageError,
};
