//! Paper Notes — podcast audio to Obsidian notes, with live job progress.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod http;
pub mod observer;
pub mod orchestrator;
pub mod pipeline;
pub mod session;
