//! CLI presentation: text and json formatters per command family.

mod catalog;
mod mutation;
mod routine;
mod shared;

pub use catalog::{format_catalog_json, format_catalog_text};
pub use mutation::{
    format_assign_outcome, format_clear_outcome, format_conflict_report, format_rebuild_summary,
    format_validation_errors,
};
pub use routine::{
    format_section_routine_json, format_section_routine_text, format_teacher_schedule_json,
    format_teacher_schedule_text,
};
