//! Conflict Checker
//!
//! Pure decision logic: given the candidate rows of one placement, report
//! every rule they would break against committed state and against each
//! other. Never writes.

use crate::catalog::SlotCatalog;
use crate::error::StorageError;
use crate::routine::{CellKey, RoutineSlotEntry, RoutineStore};
use crate::types::{day_name, DayIndex, SlotIndex, SpanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    SlotOccupied,
    SectionLabGroupCollision,
    TeacherDoubleBooked,
    RoomDoubleBooked,
    InvalidSlot,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::SlotOccupied => "SLOT_OCCUPIED",
            ConflictKind::SectionLabGroupCollision => "SECTION_LAB_GROUP_COLLISION",
            ConflictKind::TeacherDoubleBooked => "TEACHER_DOUBLE_BOOKED",
            ConflictKind::RoomDoubleBooked => "ROOM_DOUBLE_BOOKED",
            ConflictKind::InvalidSlot => "INVALID_SLOT",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    pub lab_group: Option<String>,
    pub message: String,
    /// Cell of the entry the candidate clashes with, when it is committed
    pub existing: Option<CellKey>,
    /// Teacher or room id behind a double booking
    pub resource: Option<String>,
}

impl Conflict {
    fn at(kind: ConflictKind, row: &RoutineSlotEntry, message: String) -> Self {
        Self {
            kind,
            day_index: row.day_index,
            slot_index: row.slot_index,
            lab_group: row.lab_group.clone(),
            message,
            existing: None,
            resource: None,
        }
    }

    fn with_existing(mut self, existing: &RoutineSlotEntry) -> Self {
        self.existing = Some(existing.key());
        self
    }

    fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Every violation found for one placement; empty means the caller may commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Whether any conflict of `kind` was reported
    pub fn has(&self, kind: ConflictKind) -> bool {
        self.conflicts.iter().any(|c| c.kind == kind)
    }

    /// Distinct kinds in the report
    pub fn kinds(&self) -> BTreeSet<ConflictKind> {
        self.conflicts.iter().map(|c| c.kind).collect()
    }

    fn push(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict(s)", self.conflicts.len())?;
        for conflict in &self.conflicts {
            write!(f, "; {}", conflict)?;
        }
        Ok(())
    }
}

fn groups_collide(a: Option<&str>, b: Option<&str>) -> bool {
    a.is_none() != b.is_none()
}

fn describe_group(group: Option<&str>) -> String {
    match group {
        Some(g) => format!("lab group {}", g),
        None => "the whole section".to_string(),
    }
}

fn at_slot(row: &RoutineSlotEntry) -> String {
    format!("{} slot {}", day_name(row.day_index), row.slot_index)
}

/// Check a placement against committed state and itself
///
/// Rows of `exclude_span` are treated as absent, so a span can be checked
/// against the cells it is about to vacate.
pub fn check_conflicts(
    store: &dyn RoutineStore,
    catalog: &SlotCatalog,
    candidate: &[RoutineSlotEntry],
    exclude_span: Option<&SpanId>,
) -> Result<ConflictReport, StorageError> {
    let mut report = ConflictReport::default();
    check_span_shape(catalog, candidate, &mut report);

    let visible = |e: &RoutineSlotEntry| !e.in_span(exclude_span);

    for (i, row) in candidate.iter().enumerate() {
        let status = catalog.status(&row.program_code, row.day_index, row.slot_index);
        if !status.is_assignable() {
            report.push(Conflict::at(
                ConflictKind::InvalidSlot,
                row,
                status.describe(row.day_index, row.slot_index, &row.program_code),
            ));
            continue;
        }

        if check_in_flight(&candidate[..i], row, &mut report) {
            continue;
        }

        let key = row.key();
        let mut collided_groups = Vec::new();
        for existing in store.cell_entries(&key)?.into_iter().filter(|e| visible(e)) {
            if existing.lab_group == row.lab_group {
                report.push(
                    Conflict::at(
                        ConflictKind::SlotOccupied,
                        row,
                        format!("{} is already occupied by subject {}", key, existing.subject_id),
                    )
                    .with_existing(&existing),
                );
            } else if groups_collide(existing.lab_group.as_deref(), row.lab_group.as_deref()) {
                collided_groups.push(existing);
            }
        }
        if let Some(first) = collided_groups.first() {
            let held_by: Vec<String> = collided_groups
                .iter()
                .map(|e| describe_group(e.lab_group.as_deref()))
                .collect();
            report.push(
                Conflict::at(
                    ConflictKind::SectionLabGroupCollision,
                    row,
                    format!(
                        "{} cannot be booked for {} while it is held by {}",
                        key.with_group(None),
                        describe_group(row.lab_group.as_deref()),
                        held_by.join(", ")
                    ),
                )
                .with_existing(first),
            );
        }

        for teacher in &row.teacher_ids {
            if let Some(existing) = store.teacher_entry_at(teacher, row.day_index, row.slot_index)? {
                if visible(&existing) {
                    report.push(
                        Conflict::at(
                            ConflictKind::TeacherDoubleBooked,
                            row,
                            format!(
                                "teacher {} already teaches {} at {}",
                                teacher,
                                existing.section_ref(),
                                at_slot(row)
                            ),
                        )
                        .with_existing(&existing)
                        .with_resource(teacher),
                    );
                }
            }
        }

        if let Some(existing) = store.room_entry_at(&row.room_id, row.day_index, row.slot_index)? {
            if visible(&existing) {
                report.push(
                    Conflict::at(
                        ConflictKind::RoomDoubleBooked,
                        row,
                        format!(
                            "room {} is already used by {} at {}",
                            row.room_id,
                            existing.section_ref(),
                            at_slot(row)
                        ),
                    )
                    .with_existing(&existing)
                    .with_resource(&row.room_id),
                );
            }
        }
    }

    debug!(
        rows = candidate.len(),
        conflicts = report.len(),
        exclude_span = exclude_span.map(|s| s.as_str()),
        "Checked placement"
    );
    Ok(report)
}

/// Compare a row with the rows before it in the same request
///
/// Returns true when the row repeats an earlier cell; it is then reported
/// once and needs no further checks.
fn check_in_flight(
    earlier: &[RoutineSlotEntry],
    row: &RoutineSlotEntry,
    report: &mut ConflictReport,
) -> bool {
    let key = row.key();
    for prior in earlier {
        if prior.key() == key {
            report.push(Conflict::at(
                ConflictKind::SlotOccupied,
                row,
                format!("{} is requested more than once in this placement", key),
            ));
            return true;
        }
    }
    for prior in earlier {
        if prior.day_index != row.day_index || prior.slot_index != row.slot_index {
            continue;
        }
        let same_section = prior.section_ref() == row.section_ref();
        if same_section && groups_collide(prior.lab_group.as_deref(), row.lab_group.as_deref()) {
            report.push(Conflict::at(
                ConflictKind::SectionLabGroupCollision,
                row,
                format!(
                    "{} is requested for both {} and {}",
                    key.with_group(None),
                    describe_group(prior.lab_group.as_deref()),
                    describe_group(row.lab_group.as_deref())
                ),
            ));
        }
        for teacher in row.teacher_ids.iter().filter(|t| prior.teacher_ids.contains(t)) {
            report.push(
                Conflict::at(
                    ConflictKind::TeacherDoubleBooked,
                    row,
                    format!("teacher {} is requested twice at {}", teacher, at_slot(row)),
                )
                .with_resource(teacher),
            );
        }
        if prior.room_id == row.room_id {
            report.push(
                Conflict::at(
                    ConflictKind::RoomDoubleBooked,
                    row,
                    format!("room {} is requested twice at {}", row.room_id, at_slot(row)),
                )
                .with_resource(&row.room_id),
            );
        }
    }
    false
}

/// Rows of a multi-period placement must form one contiguous run on one day
/// with identical class details
fn check_span_shape(catalog: &SlotCatalog, candidate: &[RoutineSlotEntry], report: &mut ConflictReport) {
    let Some(first) = candidate.first() else {
        return;
    };
    if candidate.len() < 2 {
        return;
    }

    if candidate.iter().any(|r| r.day_index != first.day_index) {
        report.push(Conflict::at(
            ConflictKind::InvalidSlot,
            first,
            "a multi-period class must stay on a single day".to_string(),
        ));
        return;
    }

    if let Some(odd) = candidate
        .iter()
        .find(|r| r.span_signature() != first.span_signature())
    {
        report.push(Conflict::at(
            ConflictKind::InvalidSlot,
            odd,
            format!(
                "slot {} disagrees with the rest of the class on subject, teachers, room, lab group or session type",
                odd.slot_index
            ),
        ));
    }

    let slots: BTreeSet<SlotIndex> = candidate.iter().map(|r| r.slot_index).collect();
    let ordered: Vec<SlotIndex> = slots.into_iter().collect();
    for pair in ordered.windows(2) {
        if !catalog.is_adjacent(pair[0], pair[1]) {
            let row = candidate
                .iter()
                .find(|r| r.slot_index == pair[1])
                .unwrap_or(first);
            report.push(Conflict::at(
                ConflictKind::InvalidSlot,
                row,
                format!(
                    "slots {} and {} are not contiguous periods",
                    pair[0], pair[1]
                ),
            ));
        }
    }
}
