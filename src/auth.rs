//! Caller identity
//!
//! Identity and role are passed explicitly into every engine operation.
//! Reads are open; mutations need an elevated role.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the caller as reported by the auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May only read routines and teacher schedules
    Viewer,
    /// May assign and clear routine cells
    Editor,
    /// Editor plus maintenance operations (view rebuilds)
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "unknown role '{}' (expected viewer, editor or admin)",
                other
            )),
        }
    }
}

/// Identity of whoever issued a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub caller_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(caller_id: impl Into<String>, role: Role) -> Self {
        Self {
            caller_id: caller_id.into(),
            role,
        }
    }

    /// Verify that the caller can mutate the routine
    pub fn verify_write(&self) -> Result<(), ApiError> {
        if self.role < Role::Editor {
            return Err(ApiError::Unauthorized(format!(
                "Caller {} (role: {}) cannot modify routines",
                self.caller_id, self.role
            )));
        }
        Ok(())
    }

    /// Verify that the caller can run maintenance operations
    pub fn verify_admin(&self) -> Result<(), ApiError> {
        if self.role < Role::Admin {
            return Err(ApiError::Unauthorized(format!(
                "Caller {} (role: {}) cannot run maintenance operations",
                self.caller_id, self.role
            )));
        }
        Ok(())
    }
}
