//! Shared presentation helpers: headings, tables, json encoding.

use crate::error::{ApiError, StorageError};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Row, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

pub(super) fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Bordered table with the given header row
pub(super) fn new_table(header: impl Into<Row>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY).set_header(header);
    table
}

pub(super) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Corrupt(format!("json output: {}", e))))
}

/// "A" → "[A] ", whole section → ""
pub(super) fn group_prefix(group: Option<&str>) -> String {
    match group {
        Some(g) => format!("[{}] ", g),
        None => String::new(),
    }
}
