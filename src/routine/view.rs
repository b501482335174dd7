//! Section routine read view: day → slot → entries with display names.

use crate::catalog::SlotCatalog;
use crate::registry::EntityRegistry;
use crate::routine::{RoutineSlotEntry, SectionRef};
use crate::types::{DayIndex, SlotIndex};
use serde::Serialize;
use std::collections::BTreeMap;

/// One committed entry plus the display metadata the UI needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineCell {
    #[serde(flatten)]
    pub entry: RoutineSlotEntry,
    pub slot_label: String,
    pub subject_code: String,
    pub subject_name: String,
    pub teacher_names: Vec<String>,
    pub room_name: String,
}

impl RoutineCell {
    pub fn enrich(
        entry: RoutineSlotEntry,
        registry: &dyn EntityRegistry,
        catalog: &SlotCatalog,
    ) -> Self {
        let (subject_code, subject_name) = registry
            .subject(&entry.subject_id)
            .map(|s| (s.code.clone(), s.name.clone()))
            .unwrap_or_else(|| (entry.subject_id.clone(), entry.subject_id.clone()));
        let teacher_names = entry
            .teacher_ids
            .iter()
            .map(|id| {
                registry
                    .teacher(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect();
        let room_name = registry
            .room(&entry.room_id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| entry.room_id.clone());
        Self {
            slot_label: catalog.label(entry.slot_index),
            subject_code,
            subject_name,
            teacher_names,
            room_name,
            entry,
        }
    }
}

/// A section's whole week
///
/// A cell holds one whole-section entry or one entry per lab group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRoutine {
    pub section: SectionRef,
    pub days: BTreeMap<DayIndex, BTreeMap<SlotIndex, Vec<RoutineCell>>>,
}

impl SectionRoutine {
    pub fn build(
        section: SectionRef,
        entries: Vec<RoutineSlotEntry>,
        registry: &dyn EntityRegistry,
        catalog: &SlotCatalog,
    ) -> Self {
        let mut days: BTreeMap<DayIndex, BTreeMap<SlotIndex, Vec<RoutineCell>>> = BTreeMap::new();
        for entry in entries {
            let day = entry.day_index;
            let slot = entry.slot_index;
            days.entry(day)
                .or_default()
                .entry(slot)
                .or_default()
                .push(RoutineCell::enrich(entry, registry, catalog));
        }
        for slots in days.values_mut() {
            for cells in slots.values_mut() {
                cells.sort_by(|a, b| a.entry.lab_group.cmp(&b.entry.lab_group));
            }
        }
        Self { section, days }
    }

    /// Entries occupying a cell (empty when free)
    pub fn cell(&self, day: DayIndex, slot: SlotIndex) -> &[RoutineCell] {
        self.days
            .get(&day)
            .and_then(|slots| slots.get(&slot))
            .map(|cells| cells.as_slice())
            .unwrap_or(&[])
    }

    /// Every entry of the week in (day, slot, group) order
    pub fn entries(&self) -> impl Iterator<Item = &RoutineSlotEntry> {
        self.days
            .values()
            .flat_map(|slots| slots.values())
            .flat_map(|cells| cells.iter().map(|c| &c.entry))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
