//! Environment source: ROUTINE__SECTION__KEY, e.g. ROUTINE__PROJECTOR__MAX_QUEUE_SIZE=500

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "ROUTINE";
pub const SEPARATOR: &str = "__";

/// Add the environment override source; always the last source added.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator(SEPARATOR)
            .separator(SEPARATOR)
            .try_parsing(true),
    )
}
