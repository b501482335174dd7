//! Request boundary
//!
//! Typed requests for every engine operation with field-level validation.
//! Shape checks run here, before anything touches the registry, the
//! conflict checker, or the store.

use crate::routine::{CellKey, RoutineSlotEntry, SectionRef, KEY_SEPARATOR};
use crate::types::{DayIndex, ProgramCode, RoomId, SessionType, SlotIndex, SpanId, SubjectId, TeacherId, MAX_DAY_INDEX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted identifier
pub const MAX_ID_LEN: usize = 64;
/// Longest accepted notes field
pub const MAX_NOTES_LEN: usize = 500;
/// Most periods a single placement may cover
pub const MAX_SPAN_LEN: usize = 8;

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every field error found in one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn check_id(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "must not be empty");
    } else if value.len() > MAX_ID_LEN {
        errors.push(field, format!("must be at most {} characters", MAX_ID_LEN));
    } else if value.contains(KEY_SEPARATOR) {
        errors.push(field, format!("must not contain '{}'", KEY_SEPARATOR));
    }
}

fn check_section(errors: &mut ValidationErrors, program_code: &str, semester: u8, section: &str) {
    check_id(errors, "program_code", program_code);
    if semester == 0 {
        errors.push("semester", "must be at least 1");
    }
    check_id(errors, "section", section);
}

fn check_day(errors: &mut ValidationErrors, day: DayIndex) {
    if day > MAX_DAY_INDEX {
        errors.push("day_index", format!("must be between 0 and {}", MAX_DAY_INDEX));
    }
}

fn check_lab_group(errors: &mut ValidationErrors, lab_group: Option<&str>) {
    if let Some(group) = lab_group {
        check_id(errors, "lab_group", group);
    }
}

fn clean(value: &str) -> String {
    value.trim().to_string()
}

/// Empty or whitespace-only lab groups mean "whole section"
fn clean_group(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
}

/// A class placement: one period or a contiguous run of periods on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub day_index: DayIndex,
    pub slot_indexes: Vec<SlotIndex>,
    #[serde(default)]
    pub lab_group: Option<String>,
    pub subject_id: SubjectId,
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: RoomId,
    pub session_type: SessionType,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlacementRequest {
    /// Trimmed copy with empty optionals collapsed to `None`
    pub fn normalized(&self) -> Self {
        let mut slot_indexes = self.slot_indexes.clone();
        slot_indexes.sort_unstable();
        Self {
            program_code: clean(&self.program_code),
            semester: self.semester,
            section: clean(&self.section),
            day_index: self.day_index,
            slot_indexes,
            lab_group: clean_group(&self.lab_group),
            subject_id: clean(&self.subject_id),
            teacher_ids: self.teacher_ids.iter().map(|t| clean(t)).collect(),
            room_id: clean(&self.room_id),
            session_type: self.session_type,
            notes: self
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }

    /// Shape validation; reports every bad field
    ///
    /// Repeated slot indexes are left to the conflict checker, which reports
    /// them as self-conflicts of the placement.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_section(&mut errors, &self.program_code, self.semester, &self.section);
        check_day(&mut errors, self.day_index);
        if self.slot_indexes.is_empty() {
            errors.push("slot_indexes", "at least one slot is required");
        } else if self.slot_indexes.len() > MAX_SPAN_LEN {
            errors.push(
                "slot_indexes",
                format!("a placement may cover at most {} slots", MAX_SPAN_LEN),
            );
        }
        check_lab_group(&mut errors, self.lab_group.as_deref());
        check_id(&mut errors, "subject_id", &self.subject_id);
        if self.teacher_ids.is_empty() {
            errors.push("teacher_ids", "at least one teacher is required");
        }
        for (i, teacher) in self.teacher_ids.iter().enumerate() {
            check_id(&mut errors, &format!("teacher_ids[{}]", i), teacher);
            if self.teacher_ids[..i].contains(teacher) {
                errors.push(
                    format!("teacher_ids[{}]", i),
                    format!("teacher {} is listed more than once", teacher),
                );
            }
        }
        check_id(&mut errors, "room_id", &self.room_id);
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                errors.push("notes", format!("must be at most {} characters", MAX_NOTES_LEN));
            }
        }
        errors.into_result()
    }

    pub fn section_ref(&self) -> SectionRef {
        SectionRef::new(self.program_code.clone(), self.semester, self.section.clone())
    }

    /// Candidate rows in slot order, one per requested slot, without a span id
    pub fn to_rows(&self) -> Vec<RoutineSlotEntry> {
        self.slot_indexes
            .iter()
            .map(|slot| RoutineSlotEntry {
                program_code: self.program_code.clone(),
                semester: self.semester,
                section: self.section.clone(),
                day_index: self.day_index,
                slot_index: *slot,
                lab_group: self.lab_group.clone(),
                subject_id: self.subject_id.clone(),
                teacher_ids: self.teacher_ids.clone(),
                room_id: self.room_id.clone(),
                session_type: self.session_type,
                span_id: None,
                notes: self.notes.clone(),
            })
            .collect()
    }
}

/// Replace every row of an existing span with a new placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignSpanRequest {
    pub span_id: SpanId,
    pub placement: PlacementRequest,
}

/// Address of one routine cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCellRequest {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    #[serde(default)]
    pub lab_group: Option<String>,
}

impl ClearCellRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_section(&mut errors, &self.program_code, self.semester, &self.section);
        check_day(&mut errors, self.day_index);
        check_lab_group(&mut errors, self.lab_group.as_deref());
        errors.into_result()
    }

    pub fn key(&self) -> CellKey {
        CellKey {
            program_code: clean(&self.program_code),
            semester: self.semester,
            section: clean(&self.section),
            day_index: self.day_index,
            slot_index: self.slot_index,
            lab_group: clean_group(&self.lab_group),
        }
    }
}

/// Retire a subject from a section's whole week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSubjectRequest {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub subject_code: String,
}

impl ClearSubjectRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_section(&mut errors, &self.program_code, self.semester, &self.section);
        check_id(&mut errors, "subject_code", &self.subject_code);
        errors.into_result()
    }

    pub fn section_ref(&self) -> SectionRef {
        SectionRef::new(clean(&self.program_code), self.semester, clean(&self.section))
    }
}

/// Shape checks for a section read; its key prefix is used as a raw scan prefix
pub fn validate_section(section: &SectionRef) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_section(&mut errors, &section.program_code, section.semester, &section.section);
    errors.into_result()
}
