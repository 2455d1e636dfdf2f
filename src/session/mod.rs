//! Per-job session records.

pub mod model;
pub mod store;

pub use model::{ProcessingStatus, ProgressEvent, Session, SessionPatch, SessionResult, SessionResults};
pub use store::SessionStore;
