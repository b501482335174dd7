//! CLI layer: parse, route, output, and presentation for the routine binary.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{parse_day, Cli, Commands, PlacementArgs, SectionArgs};
pub use route::RunContext;
