//! # Error Types
//!
//! Top-level error for the pipeline core. Each subsystem owns its own
//! `thiserror` enum; this one aggregates them for callers that drive several
//! subsystems from one composition root.

use thiserror::Error;

use crate::config::ConfigError;
use crate::messaging::MessagingError;
use crate::status::StatusError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
