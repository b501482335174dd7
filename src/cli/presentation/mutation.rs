//! Mutation presentation: assign/clear outcomes and rejection details.

use super::shared::{group_prefix, new_table};
use crate::conflict::ConflictReport;
use crate::engine::{AssignOutcome, ClearOutcome};
use crate::request::ValidationErrors;
use crate::types::day_name;

pub fn format_assign_outcome(outcome: &AssignOutcome) -> String {
    let Some(first) = outcome.rows.first() else {
        return "Nothing assigned.".to_string();
    };
    let slots: Vec<String> = outcome.rows.iter().map(|r| r.slot_index.to_string()).collect();
    let mut s = format!(
        "Assigned {} to {}/{}/{} {}{} slot(s) {}",
        first.subject_id,
        first.program_code,
        first.semester,
        first.section,
        group_prefix(first.lab_group.as_deref()),
        day_name(first.day_index),
        slots.join(", ")
    );
    s.push_str(&format!(
        "\n  Teachers: {}\n  Room: {}",
        first.teacher_ids.join(", "),
        first.room_id
    ));
    if let Some(span) = &outcome.span_id {
        s.push_str(&format!("\n  Span: {}", span));
    }
    s
}

pub fn format_clear_outcome(outcome: &ClearOutcome) -> String {
    if outcome.deleted_count == 0 {
        return "Nothing to clear.".to_string();
    }
    format!(
        "Cleared {} slot(s)\n  Affected teachers: {}",
        outcome.deleted_count,
        outcome.affected_teacher_ids.join(", ")
    )
}

pub fn format_rebuild_summary(enqueued: usize, completed: usize, failed: usize) -> String {
    format!(
        "Rebuilt teacher views\n  Enqueued: {}\n  Projected: {}\n  Failed: {}",
        enqueued, completed, failed
    )
}

/// Every violation of a rejected placement, one row each
pub fn format_conflict_report(report: &ConflictReport) -> String {
    let mut table = new_table(vec!["Kind", "Day", "Slot", "Group", "Detail"]);
    for conflict in &report.conflicts {
        table.add_row(vec![
            conflict.kind.to_string(),
            day_name(conflict.day_index),
            conflict.slot_index.to_string(),
            conflict.lab_group.clone().unwrap_or_else(|| "-".to_string()),
            conflict.message.clone(),
        ]);
    }
    format!(
        "Placement rejected with {} conflict(s):\n{}",
        report.len(),
        table
    )
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut s = format!("Invalid request ({} error(s)):", errors.0.len());
    for error in &errors.0 {
        s.push_str(&format!("\n  - {}: {}", error.field, error.message));
    }
    s
}
