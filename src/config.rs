//! Configuration System
//!
//! Layered configuration: built-in defaults, the global user file, the
//! workspace files, then `ROUTINE__SECTION__KEY` environment variables.
//! Validated after load so a bad catalog or registry is reported before the
//! engine starts.

use crate::catalog::{CatalogConfig, SlotCatalog};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::projection::ProjectorConfig;
use crate::registry::{InMemoryRegistry, RegistryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineConfig {
    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub projector: ProjectorConfig,

    /// Weekly slot grid
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Teachers, rooms, subjects, and programs
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// System-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Storage paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory, relative paths resolve against the workspace
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".routine/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    System(String),
    Projector(String),
    Catalog(String),
    Registry(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::System(msg) => write!(f, "System: {}", msg),
            ValidationError::Projector(msg) => write!(f, "Projector: {}", msg),
            ValidationError::Catalog(msg) => write!(f, "Catalog: {}", msg),
            ValidationError::Registry(msg) => write!(f, "Registry: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ProjectorConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than zero".to_string());
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            ));
        }
        Ok(())
    }
}

impl RoutineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.system.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "Store path cannot be empty".to_string(),
            ));
        }

        if let Err(e) = self.projector.validate() {
            errors.push(ValidationError::Projector(e));
        }

        if let Err(e) = SlotCatalog::from_config(&self.catalog) {
            errors.push(ValidationError::Catalog(e.to_string()));
        }

        if let Err(e) = InMemoryRegistry::from_config(&self.registry) {
            errors.push(ValidationError::Registry(e.to_string()));
        }
        for program in &self.catalog.programs {
            if !self.registry.programs.is_empty()
                && !self.registry.programs.iter().any(|p| p.code == program.code)
            {
                errors.push(ValidationError::Catalog(format!(
                    "structure for unknown program {}",
                    program.code
                )));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every error into one `ApiError`
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    pub fn build_catalog(&self) -> Result<SlotCatalog, ApiError> {
        SlotCatalog::from_config(&self.catalog)
    }

    pub fn build_registry(&self) -> Result<InMemoryRegistry, ApiError> {
        InMemoryRegistry::from_config(&self.registry)
    }
}
