//! Live progress observers.

pub mod registry;

pub use registry::{ObserverChannel, ObserverRegistry, ObserverToken, QueueChannel};
