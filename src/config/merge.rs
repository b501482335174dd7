//! Merge rules: defaults, override order, conflict handling.
//!
//! Sources are added lowest precedence first; later sources win key by key.
//! Tables merge, arrays (catalog periods, registry records) are replaced
//! wholesale by the higher source.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("system.storage.store_path", ".routine/store")?
        .set_default("logging.level", "warn")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
