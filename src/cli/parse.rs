//! CLI parse: clap types for the routine tool. No behavior; definitions only.

use crate::auth::Role;
use crate::types::{DayIndex, SessionType, SlotIndex, DAY_NAMES, MAX_DAY_INDEX};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Routine - class timetable assignment with conflict detection
#[derive(Parser)]
#[command(name = "routine")]
#[command(about = "Assign classes to a weekly routine and keep teacher schedules in sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Caller id recorded with every mutation
    #[arg(long, default_value = "cli")]
    pub caller: String,

    /// Caller role (viewer, editor, admin)
    #[arg(long, default_value = "editor")]
    pub role: Role,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Place a class in one slot or a contiguous run of slots
    Assign(PlacementArgs),
    /// Replace every slot of an existing span with a new placement
    ReassignSpan {
        /// Span id shared by the slots to replace
        span_id: String,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// Clear one cell (clears the whole span when the cell is part of one)
    ClearCell {
        #[command(flatten)]
        section: SectionArgs,
        /// Day (0-6 or a day name)
        #[arg(long, value_parser = parse_day)]
        day: DayIndex,
        /// Slot index
        #[arg(long)]
        slot: SlotIndex,
        /// Lab group; omit to address the whole-section entry
        #[arg(long)]
        lab_group: Option<String>,
    },
    /// Clear every slot of a span
    ClearSpan {
        span_id: String,
    },
    /// Clear every slot of a subject within a section
    ClearSubject {
        #[command(flatten)]
        section: SectionArgs,
        /// Subject code, e.g. CT461
        #[arg(long)]
        subject_code: String,
    },
    /// Show a section's weekly routine
    Show {
        #[command(flatten)]
        section: SectionArgs,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a teacher's weekly schedule
    Teacher {
        teacher_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Project the view now instead of reading the cached one
        #[arg(long)]
        refresh: bool,
    },
    /// Rebuild every teacher view from the routine (admin)
    RebuildViews,
    /// Show the slot catalog
    Catalog {
        /// Program whose day and period structure to show
        #[arg(long)]
        program: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    /// Commands that may enqueue teacher-view projections
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Commands::Assign(_)
                | Commands::ReassignSpan { .. }
                | Commands::ClearCell { .. }
                | Commands::ClearSpan { .. }
                | Commands::ClearSubject { .. }
                | Commands::RebuildViews
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Commands::Assign(_) => "assign",
            Commands::ReassignSpan { .. } => "reassign-span",
            Commands::ClearCell { .. } => "clear-cell",
            Commands::ClearSpan { .. } => "clear-span",
            Commands::ClearSubject { .. } => "clear-subject",
            Commands::Show { .. } => "show",
            Commands::Teacher { .. } => "teacher",
            Commands::RebuildViews => "rebuild-views",
            Commands::Catalog { .. } => "catalog",
        }
    }
}

/// Program, semester, and section of a routine
#[derive(Args, Debug, Clone)]
pub struct SectionArgs {
    /// Program code, e.g. BCT
    #[arg(long)]
    pub program: String,
    /// Semester number
    #[arg(long)]
    pub semester: u8,
    /// Section name, e.g. AB
    #[arg(long)]
    pub section: String,
}

/// A class placement
#[derive(Args, Debug, Clone)]
pub struct PlacementArgs {
    #[command(flatten)]
    pub section: SectionArgs,
    /// Day (0-6 or a day name)
    #[arg(long, value_parser = parse_day)]
    pub day: DayIndex,
    /// Slot indexes, comma separated (several slots form a span)
    #[arg(long, value_delimiter = ',', required = true)]
    pub slots: Vec<SlotIndex>,
    /// Lab group; omit for the whole section
    #[arg(long)]
    pub lab_group: Option<String>,
    /// Subject id
    #[arg(long)]
    pub subject: String,
    /// Teacher id (repeat or comma separate for co-teaching)
    #[arg(long = "teacher", value_delimiter = ',', required = true)]
    pub teachers: Vec<String>,
    /// Room id
    #[arg(long)]
    pub room: String,
    /// Session type (THEORY, LAB, PRACTICAL, TUTORIAL)
    #[arg(long, default_value = "THEORY")]
    pub session_type: SessionType,
    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

/// Parse a day given as an index or an (abbreviated) English name
pub fn parse_day(raw: &str) -> Result<DayIndex, String> {
    let raw = raw.trim();
    if let Ok(day) = raw.parse::<DayIndex>() {
        if day <= MAX_DAY_INDEX {
            return Ok(day);
        }
        return Err(format!("day index {} is out of range (0-{})", day, MAX_DAY_INDEX));
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.len() >= 3 {
        for (index, name) in DAY_NAMES.iter().enumerate() {
            if name.to_ascii_lowercase().starts_with(&lowered) {
                return Ok(index as DayIndex);
            }
        }
    }
    Err(format!("unknown day '{}'", raw))
}
