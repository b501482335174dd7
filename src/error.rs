//! Error types for the routine assignment engine.

use crate::conflict::ConflictReport;
use crate::request::ValidationErrors;
use crate::types::SpanId;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A uniqueness or occupancy index rejected a write inside the commit transaction
    #[error("Store constraint violated: {0}")]
    Constraint(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// Errors returned by the engine's public operations
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(ValidationErrors),

    #[error("Placement rejected: {0}")]
    Conflict(ConflictReport),

    #[error("Teacher not found: {0}")]
    TeacherNotFound(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("Span not found: {0}")]
    SpanNotFound(SpanId),

    #[error("Concurrent write detected: {0}")]
    RaceDetected(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    StorageError(StorageError),

    #[error("Caller unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Projection error: {0}")]
    ProjectionError(String),
}

impl ApiError {
    /// Whether the same request may succeed if resubmitted unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RaceDetected(_) | ApiError::StoreUnavailable(_)
        )
    }

    /// Whether this error names an entity that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::TeacherNotFound(_)
                | ApiError::RoomNotFound(_)
                | ApiError::SubjectNotFound(_)
                | ApiError::ProgramNotFound(_)
                | ApiError::SpanNotFound(_)
        )
    }

    /// Conflict report carried by a rejected placement, if any
    pub fn conflict_report(&self) -> Option<&ConflictReport> {
        match self {
            ApiError::Conflict(report) => Some(report),
            _ => None,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Constraint(msg) => ApiError::RaceDetected(msg),
            StorageError::Unavailable(msg) => ApiError::StoreUnavailable(msg),
            StorageError::IoError(e) => ApiError::StoreUnavailable(e.to_string()),
            other @ StorageError::Corrupt(_) => ApiError::StorageError(other),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
