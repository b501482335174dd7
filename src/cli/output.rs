//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::cli::presentation::{format_conflict_report, format_validation_errors};
use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
/// Conflict and validation errors list every violation.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Conflict(report) => format_conflict_report(report),
        ApiError::Validation(errors) => format_validation_errors(errors),
        other => other.to_string(),
    }
}
