//! Background pipeline execution.

pub mod driver;

pub use driver::{ExportOutcome, ExportRequest, JobDeps, JobDriver};
