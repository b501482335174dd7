//! Slot Catalog
//!
//! Canonical weekly grid: which days are teaching days, which periods exist,
//! which periods are breaks, and which days/periods apply to a program.
//! Immutable once built; the engine only reads it.

use crate::error::ApiError;
use crate::types::{day_name, DayIndex, SlotIndex, MAX_DAY_INDEX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One period of the daily timetable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDefinition {
    pub index: SlotIndex,
    pub label: String,
    #[serde(default)]
    pub is_break: bool,
}

/// Days and periods a program's structure uses
///
/// Empty lists mean "every catalog day" / "every catalog period".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStructure {
    pub code: String,
    #[serde(default)]
    pub days: Vec<DayIndex>,
    #[serde(default)]
    pub periods: Vec<SlotIndex>,
}

/// Catalog configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_days")]
    pub days: Vec<DayIndex>,
    #[serde(default = "default_periods")]
    pub periods: Vec<PeriodDefinition>,
    #[serde(default)]
    pub programs: Vec<ProgramStructure>,
}

fn default_days() -> Vec<DayIndex> {
    (0..=5).collect()
}

fn default_periods() -> Vec<PeriodDefinition> {
    const LABELS: [&str; 8] = [
        "10:15-11:05",
        "11:05-11:55",
        "11:55-12:45",
        "12:45-13:35",
        "13:35-14:25",
        "14:25-15:15",
        "15:15-16:05",
        "16:05-16:55",
    ];
    LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| PeriodDefinition {
            index: i as SlotIndex,
            label: label.to_string(),
            is_break: i == 3,
        })
        .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            periods: default_periods(),
            programs: Vec::new(),
        }
    }
}

/// A resolved (day, period) cell of the weekly grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub day_index: DayIndex,
    pub slot_index: SlotIndex,
    pub label: String,
    pub is_break: bool,
}

/// Result of checking whether a (program, day, slot) can hold a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Assignable,
    Break,
    UnknownDay,
    UnknownPeriod,
    OutsideProgram,
}

impl SlotStatus {
    pub fn is_assignable(self) -> bool {
        self == SlotStatus::Assignable
    }

    pub fn describe(self, day: DayIndex, slot: SlotIndex, program: &str) -> String {
        match self {
            SlotStatus::Assignable => format!("{} slot {} is assignable", day_name(day), slot),
            SlotStatus::Break => format!("{} slot {} is a break period", day_name(day), slot),
            SlotStatus::UnknownDay => format!("day {} is not a teaching day", day),
            SlotStatus::UnknownPeriod => format!("slot {} does not exist in the catalog", slot),
            SlotStatus::OutsideProgram => format!(
                "{} slot {} is not part of program {}'s structure",
                day_name(day),
                slot,
                program
            ),
        }
    }
}

/// Slot catalog
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    days: BTreeSet<DayIndex>,
    periods: BTreeMap<SlotIndex, PeriodDefinition>,
    programs: HashMap<String, ProgramStructure>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        // Default config is known-valid
        Self::build(&CatalogConfig::default())
    }
}

impl SlotCatalog {
    /// Build a catalog from configuration, rejecting malformed grids
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ApiError> {
        if config.days.is_empty() {
            return Err(ApiError::ConfigError(
                "catalog must define at least one teaching day".to_string(),
            ));
        }
        if let Some(bad) = config.days.iter().find(|d| **d > MAX_DAY_INDEX) {
            return Err(ApiError::ConfigError(format!(
                "catalog day {} is out of range 0..={}",
                bad, MAX_DAY_INDEX
            )));
        }
        if config.periods.is_empty() {
            return Err(ApiError::ConfigError(
                "catalog must define at least one period".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for period in &config.periods {
            if !seen.insert(period.index) {
                return Err(ApiError::ConfigError(format!(
                    "catalog period {} is defined twice",
                    period.index
                )));
            }
        }
        let mut codes = BTreeSet::new();
        for structure in &config.programs {
            let program = &structure.code;
            if !codes.insert(program.as_str()) {
                return Err(ApiError::ConfigError(format!(
                    "program {} has more than one catalog structure",
                    program
                )));
            }
            if let Some(day) = structure.days.iter().find(|d| !config.days.contains(d)) {
                return Err(ApiError::ConfigError(format!(
                    "program {} uses day {} which is not a catalog day",
                    program, day
                )));
            }
            if let Some(period) = structure.periods.iter().find(|p| !seen.contains(p)) {
                return Err(ApiError::ConfigError(format!(
                    "program {} uses period {} which is not a catalog period",
                    program, period
                )));
            }
        }
        Ok(Self::build(config))
    }

    fn build(config: &CatalogConfig) -> Self {
        Self {
            days: config.days.iter().copied().collect(),
            periods: config
                .periods
                .iter()
                .map(|p| (p.index, p.clone()))
                .collect(),
            programs: config
                .programs
                .iter()
                .map(|p| (p.code.clone(), p.clone()))
                .collect(),
        }
    }

    /// Teaching days in order
    pub fn days(&self) -> impl Iterator<Item = DayIndex> + '_ {
        self.days.iter().copied()
    }

    /// Periods in order
    pub fn periods(&self) -> impl Iterator<Item = &PeriodDefinition> {
        self.periods.values()
    }

    /// Resolve a single grid cell
    pub fn slot(&self, day: DayIndex, slot: SlotIndex) -> Option<Slot> {
        if !self.days.contains(&day) {
            return None;
        }
        self.periods.get(&slot).map(|p| Slot {
            day_index: day,
            slot_index: p.index,
            label: p.label.clone(),
            is_break: p.is_break,
        })
    }

    /// All slots of a day, breaks included
    pub fn slots_for_day(&self, day: DayIndex) -> Vec<Slot> {
        if !self.days.contains(&day) {
            return Vec::new();
        }
        self.periods
            .values()
            .map(|p| Slot {
                day_index: day,
                slot_index: p.index,
                label: p.label.clone(),
                is_break: p.is_break,
            })
            .collect()
    }

    /// Period label, or the bare index when the period is unknown
    pub fn label(&self, slot: SlotIndex) -> String {
        self.periods
            .get(&slot)
            .map(|p| p.label.clone())
            .unwrap_or_else(|| format!("#{}", slot))
    }

    /// Classify a (program, day, slot) triple
    pub fn status(&self, program: &str, day: DayIndex, slot: SlotIndex) -> SlotStatus {
        if !self.days.contains(&day) {
            return SlotStatus::UnknownDay;
        }
        let Some(period) = self.periods.get(&slot) else {
            return SlotStatus::UnknownPeriod;
        };
        if period.is_break {
            return SlotStatus::Break;
        }
        if let Some(structure) = self.programs.get(program) {
            let day_ok = structure.days.is_empty() || structure.days.contains(&day);
            let period_ok = structure.periods.is_empty() || structure.periods.contains(&slot);
            if !day_ok || !period_ok {
                return SlotStatus::OutsideProgram;
            }
        }
        SlotStatus::Assignable
    }

    /// Whether `b` directly follows `a` in the period order with nothing between
    pub fn is_adjacent(&self, a: SlotIndex, b: SlotIndex) -> bool {
        let mut range = self.periods.range(a..);
        matches!(
            (range.next(), range.next()),
            (Some((first, _)), Some((second, _))) if *first == a && *second == b
        )
    }
}
