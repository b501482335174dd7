//! Routine presentation: section week grid and teacher schedule.

use super::shared::{format_section_heading, group_prefix, new_table, to_json};
use crate::catalog::{SlotCatalog, SlotStatus};
use crate::error::ApiError;
use crate::projection::TeacherScheduleView;
use crate::routine::{RoutineCell, SectionRoutine};
use crate::types::day_name;

/// One line block per entry: subject, teachers, room
fn describe_cell(cell: &RoutineCell) -> String {
    let mut text = format!(
        "{}{} ({})\n{}\n{}",
        group_prefix(cell.entry.lab_group.as_deref()),
        cell.subject_code,
        cell.entry.session_type,
        cell.teacher_names.join(", "),
        cell.room_name
    );
    if cell.entry.span_id.is_some() {
        text.push_str(" *");
    }
    text
}

pub fn format_section_routine_text(routine: &SectionRoutine, catalog: &SlotCatalog) -> String {
    let mut out = format_section_heading(&format!("Routine {}", routine.section));
    out.push('\n');

    if routine.is_empty() {
        out.push_str("No classes assigned.");
        return out;
    }

    let periods: Vec<_> = catalog.periods().collect();
    let mut header = vec!["Day".to_string()];
    header.extend(periods.iter().map(|p| format!("{}\n{}", p.index, p.label)));
    let mut table = new_table(header);

    for day in catalog.days() {
        let mut row = vec![day_name(day)];
        for period in &periods {
            let cells = routine.cell(day, period.index);
            let text = if !cells.is_empty() {
                cells
                    .iter()
                    .map(describe_cell)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            } else {
                match catalog.status(&routine.section.program_code, day, period.index) {
                    SlotStatus::Break => "break".to_string(),
                    SlotStatus::Assignable => String::new(),
                    _ => "-".to_string(),
                }
            };
            row.push(text);
        }
        table.add_row(row);
    }

    out.push_str(&table.to_string());
    out.push_str("\n* part of a multi-slot span");
    out
}

pub fn format_section_routine_json(routine: &SectionRoutine) -> Result<String, ApiError> {
    to_json(routine)
}

pub fn format_teacher_schedule_text(view: &TeacherScheduleView) -> String {
    let mut out = format_section_heading(&format!(
        "Schedule of {} ({})",
        view.teacher_name, view.teacher_id
    ));
    out.push('\n');

    if view.is_empty() {
        out.push_str("No classes assigned.");
        return out;
    }

    let mut table = new_table(vec!["Day", "Slot", "Time", "Section", "Subject", "Type", "Room"]);
    for (day, items) in &view.days {
        for item in items {
            table.add_row(vec![
                day_name(*day),
                item.slot_index.to_string(),
                item.slot_label.clone(),
                format!(
                    "{}{}/{}/{}",
                    group_prefix(item.lab_group.as_deref()),
                    item.program_code,
                    item.semester,
                    item.section
                ),
                format!("{} {}", item.subject_code, item.subject_name),
                item.session_type.to_string(),
                item.room_name.clone(),
            ]);
        }
    }
    out.push_str(&table.to_string());
    out.push_str(&format!("\n{} class(es)", view.item_count));
    out
}

pub fn format_teacher_schedule_json(view: &TeacherScheduleView) -> Result<String, ApiError> {
    to_json(view)
}
