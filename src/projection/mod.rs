//! Teacher-View Projector
//!
//! Derived per-teacher weekly schedules. The engine enqueues one job per
//! affected teacher after every committed mutation; a single background
//! consumer rebuilds each teacher's view from the Routine Store and swaps it
//! into the `teacher_views` cache.

pub mod queue;
pub mod store;
pub mod worker;

pub use queue::{EnqueueOutcome, ProjectionQueue, QueueStats};
pub use store::TeacherViewStore;
pub use worker::TeacherViewProjector;

use crate::catalog::SlotCatalog;
use crate::registry::EntityRegistry;
use crate::routine::RoutineSlotEntry;
use crate::types::{DayIndex, ProgramCode, RoomId, SessionType, SlotIndex, SpanId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// What happened to the teacher's rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Upsert,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Upsert => f.write_str("upsert"),
            ChangeKind::Delete => f.write_str("delete"),
        }
    }
}

/// A pending rebuild of one teacher's view
#[derive(Debug, Clone)]
pub struct ProjectionJob {
    pub teacher_id: TeacherId,
    pub change: ChangeKind,
    /// Number of retry attempts made
    pub retry_count: usize,
    pub enqueued_at: Instant,
}

impl ProjectionJob {
    pub fn new(teacher_id: impl Into<TeacherId>, change: ChangeKind) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            change,
            retry_count: 0,
            enqueued_at: Instant::now(),
        }
    }
}

/// Projector configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Distinct teachers that may wait in the queue at once
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: usize,
    /// First retry delay; doubles on every further attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_queue_size() -> usize {
    10_000
}

fn default_max_retry_attempts() -> usize {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl ProjectorConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_ms(&self, attempt: usize) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32) as u32;
        self.retry_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry_max_delay_ms)
    }
}

/// One class in a teacher's week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherScheduleItem {
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    pub slot_label: String,
    pub program_code: ProgramCode,
    pub semester: u8,
    pub section: String,
    pub lab_group: Option<String>,
    pub subject_id: SubjectId,
    pub subject_code: String,
    pub subject_name: String,
    pub room_id: RoomId,
    pub room_name: String,
    pub session_type: SessionType,
    pub span_id: Option<SpanId>,
}

/// A teacher's weekly schedule: day → classes in slot order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherScheduleView {
    pub teacher_id: TeacherId,
    pub teacher_name: String,
    pub days: BTreeMap<DayIndex, Vec<TeacherScheduleItem>>,
    pub item_count: usize,
}

impl TeacherScheduleView {
    /// View of a teacher with nothing scheduled
    pub fn empty(teacher_id: &str, registry: &dyn EntityRegistry) -> Self {
        Self {
            teacher_id: teacher_id.to_string(),
            teacher_name: teacher_name(teacher_id, registry),
            days: BTreeMap::new(),
            item_count: 0,
        }
    }

    /// Build the full view from every row the teacher appears in
    ///
    /// The result depends only on the rows and reference data, so rebuilding
    /// from the same state yields an identical view.
    pub fn build(
        teacher_id: &str,
        entries: &[RoutineSlotEntry],
        registry: &dyn EntityRegistry,
        catalog: &SlotCatalog,
    ) -> Self {
        let mut view = Self::empty(teacher_id, registry);
        for entry in entries.iter().filter(|e| e.teacher_ids.iter().any(|t| t == teacher_id)) {
            let (subject_code, subject_name) = registry
                .subject(&entry.subject_id)
                .map(|s| (s.code.clone(), s.name.clone()))
                .unwrap_or_else(|| (entry.subject_id.clone(), entry.subject_id.clone()));
            let room_name = registry
                .room(&entry.room_id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| entry.room_id.clone());
            view.days
                .entry(entry.day_index)
                .or_default()
                .push(TeacherScheduleItem {
                    day_index: entry.day_index,
                    slot_index: entry.slot_index,
                    slot_label: catalog.label(entry.slot_index),
                    program_code: entry.program_code.clone(),
                    semester: entry.semester,
                    section: entry.section.clone(),
                    lab_group: entry.lab_group.clone(),
                    subject_id: entry.subject_id.clone(),
                    subject_code,
                    subject_name,
                    room_id: entry.room_id.clone(),
                    room_name,
                    session_type: entry.session_type,
                    span_id: entry.span_id.clone(),
                });
        }
        for items in view.days.values_mut() {
            items.sort_by(|a, b| {
                (a.slot_index, &a.program_code, a.semester, &a.section, &a.lab_group).cmp(&(
                    b.slot_index,
                    &b.program_code,
                    b.semester,
                    &b.section,
                    &b.lab_group,
                ))
            });
        }
        view.item_count = view.days.values().map(Vec::len).sum();
        view
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Classes on one day in slot order
    pub fn day(&self, day: DayIndex) -> &[TeacherScheduleItem] {
        self.days.get(&day).map(|d| d.as_slice()).unwrap_or(&[])
    }
}

fn teacher_name(teacher_id: &str, registry: &dyn EntityRegistry) -> String {
    registry
        .teacher(teacher_id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| teacher_id.to_string())
}
