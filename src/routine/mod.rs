//! Routine Store
//!
//! System of record for routine cells: (program, semester, section, day,
//! slot, lab group) → the class occupying that cell. All writes go through
//! `RoutineStore::commit`, which applies a whole `ChangeSet` atomically.

pub mod persistence;
pub mod view;

pub use persistence::SledRoutineStore;
pub use view::{RoutineCell, SectionRoutine};

use crate::error::StorageError;
use crate::types::{DayIndex, ProgramCode, RoomId, SessionType, SlotIndex, SpanId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key separator used in every store key
pub const KEY_SEPARATOR: char = ':';

/// A program-semester-section cohort
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionRef {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
}

impl SectionRef {
    pub fn new(program_code: impl Into<String>, semester: u8, section: impl Into<String>) -> Self {
        Self {
            program_code: program_code.into(),
            semester,
            section: section.into(),
        }
    }

    /// Prefix shared by every entry key of this section
    pub fn key_prefix(&self) -> String {
        format!("{}:{}:{}:", self.program_code, self.semester, self.section)
    }
}

impl fmt::Display for SectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.program_code, self.semester, self.section)
    }
}

/// Identity of one routine cell, including the lab group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    /// `None` is the whole section
    pub lab_group: Option<String>,
}

impl CellKey {
    pub fn section(&self) -> SectionRef {
        SectionRef::new(self.program_code.clone(), self.semester, self.section.clone())
    }

    /// Key of the grid cell, ignoring the lab group
    pub fn cell_encode(&self) -> String {
        format!(
            "{}{}:{:03}",
            self.section().key_prefix(),
            self.day_index,
            self.slot_index
        )
    }

    /// Full entry key
    pub fn encode(&self) -> String {
        format!("{}:{}", self.cell_encode(), group_token(self.lab_group.as_deref()))
    }

    /// Same cell with a different lab group
    pub fn with_group(&self, lab_group: Option<String>) -> Self {
        Self {
            lab_group,
            ..self.clone()
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} slot {}",
            self.section(),
            crate::types::day_name(self.day_index),
            self.slot_index
        )?;
        if let Some(group) = &self.lab_group {
            write!(f, " group {}", group)?;
        }
        Ok(())
    }
}

/// Token stored for a lab group in cell and entry keys (empty = whole section)
pub fn group_token(lab_group: Option<&str>) -> &str {
    lab_group.unwrap_or("")
}

/// Key of a teacher or room occupancy index row
pub fn occupancy_key(resource_id: &str, day: DayIndex, slot: SlotIndex) -> String {
    format!("{}:{}:{:03}", resource_id, day, slot)
}

/// RoutineSlotEntry: one class occupying one routine cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineSlotEntry {
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    pub lab_group: Option<String>,
    pub subject_id: SubjectId,
    /// Ordered, duplicate-free, never empty
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: RoomId,
    pub session_type: SessionType,
    pub span_id: Option<SpanId>,
    pub notes: Option<String>,
}

impl RoutineSlotEntry {
    pub fn key(&self) -> CellKey {
        CellKey {
            program_code: self.program_code.clone(),
            semester: self.semester,
            section: self.section.clone(),
            day_index: self.day_index,
            slot_index: self.slot_index,
            lab_group: self.lab_group.clone(),
        }
    }

    pub fn section_ref(&self) -> SectionRef {
        SectionRef::new(self.program_code.clone(), self.semester, self.section.clone())
    }

    /// Whether this row belongs to the given span
    pub fn in_span(&self, span: Option<&SpanId>) -> bool {
        match (span, &self.span_id) {
            (Some(wanted), Some(own)) => wanted == own,
            _ => false,
        }
    }

    /// Whether two rows are members of the same span
    pub fn shares_span_with(&self, other: &RoutineSlotEntry) -> bool {
        self.in_span(other.span_id.as_ref())
    }

    /// Fields every member of a span must agree on
    pub fn span_signature(&self) -> SpanSignature<'_> {
        SpanSignature {
            section: (&self.program_code, self.semester, &self.section),
            day_index: self.day_index,
            lab_group: self.lab_group.as_deref(),
            subject_id: &self.subject_id,
            teacher_ids: &self.teacher_ids,
            room_id: &self.room_id,
            session_type: self.session_type,
        }
    }
}

/// Borrowed view of the fields shared by all members of a span
#[derive(Debug, PartialEq, Eq)]
pub struct SpanSignature<'a> {
    pub section: (&'a str, u8, &'a str),
    pub day_index: DayIndex,
    pub lab_group: Option<&'a str>,
    pub subject_id: &'a str,
    pub teacher_ids: &'a [TeacherId],
    pub room_id: &'a str,
    pub session_type: SessionType,
}

/// Rows to remove and insert in a single atomic commit
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub removals: Vec<CellKey>,
    pub inserts: Vec<RoutineSlotEntry>,
}

impl ChangeSet {
    pub fn insert_only(rows: Vec<RoutineSlotEntry>) -> Self {
        Self {
            removals: Vec::new(),
            inserts: rows,
        }
    }

    pub fn remove_only(keys: Vec<CellKey>) -> Self {
        Self {
            removals: keys,
            inserts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.inserts.is_empty()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    /// Rows that existed and were removed
    pub removed: Vec<RoutineSlotEntry>,
    pub inserted: usize,
}

/// Routine Store interface
///
/// Reads never observe a partially applied `ChangeSet`. `commit` re-checks
/// cell uniqueness, lab-group exclusivity, and teacher/room occupancy inside
/// its transaction and fails with `StorageError::Constraint` when any of them
/// would be violated.
pub trait RoutineStore: Send + Sync {
    fn get(&self, key: &CellKey) -> Result<Option<RoutineSlotEntry>, StorageError>;

    /// Every entry in the grid cell of `key`, whatever its lab group
    fn cell_entries(&self, key: &CellKey) -> Result<Vec<RoutineSlotEntry>, StorageError>;

    /// Entry holding `teacher_id` at (day, slot), if any
    fn teacher_entry_at(
        &self,
        teacher_id: &str,
        day: DayIndex,
        slot: SlotIndex,
    ) -> Result<Option<RoutineSlotEntry>, StorageError>;

    /// Entry holding `room_id` at (day, slot), if any
    fn room_entry_at(
        &self,
        room_id: &str,
        day: DayIndex,
        slot: SlotIndex,
    ) -> Result<Option<RoutineSlotEntry>, StorageError>;

    /// Members of a span in slot order
    fn span_entries(&self, span_id: &SpanId) -> Result<Vec<RoutineSlotEntry>, StorageError>;

    /// Every entry of a section in (day, slot, group) order
    fn section_entries(&self, section: &SectionRef) -> Result<Vec<RoutineSlotEntry>, StorageError>;

    /// Every entry a teacher appears in, in (day, slot) order
    fn teacher_entries(&self, teacher_id: &str) -> Result<Vec<RoutineSlotEntry>, StorageError>;

    fn list_all(&self) -> Result<Vec<RoutineSlotEntry>, StorageError>;

    /// Apply removals then inserts as one atomic unit
    ///
    /// Removing a key that is absent is a no-op.
    fn commit(&self, change: &ChangeSet) -> Result<CommitOutcome, StorageError>;
}
