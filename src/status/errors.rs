//! # Status Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Status record not found: {id}")]
    NotFound { id: String },

    #[error("Status record already exists: {id}")]
    AlreadyExists { id: String },

    #[error("Status record {id} kept changing underneath us; gave up after {attempts} attempt(s)")]
    WriteConflict { id: String, attempts: u32 },

    #[error("Status store error: {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("Status configuration error: {message}")]
    Configuration { message: String },
}

impl StatusError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn write_conflict(id: impl Into<String>, attempts: u32) -> Self {
        Self::WriteConflict {
            id: id.into(),
            attempts,
        }
    }

    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type StatusResult<T> = Result<T, StatusError>;
