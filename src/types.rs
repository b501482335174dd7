//! Core identifier and enum types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Program code, e.g. `BCT`
pub type ProgramCode = String;
/// Teacher identifier from the entity registry
pub type TeacherId = String;
/// Room identifier from the entity registry
pub type RoomId = String;
/// Subject identifier from the entity registry
pub type SubjectId = String;

/// Day of the week, 0 = Sunday .. 6 = Saturday
pub type DayIndex = u8;
/// Period index within a day
pub type SlotIndex = u8;

/// Highest valid day index
pub const MAX_DAY_INDEX: DayIndex = 6;

/// Day names indexed by `DayIndex`
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Display name for a day index (falls back to the number when out of range)
pub fn day_name(day: DayIndex) -> String {
    DAY_NAMES
        .get(day as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("day-{}", day))
}

/// Kind of class held in a routine cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Theory,
    Lab,
    Practical,
    Tutorial,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Theory => "THEORY",
            SessionType::Lab => "LAB",
            SessionType::Practical => "PRACTICAL",
            SessionType::Tutorial => "TUTORIAL",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "THEORY" | "T" => Ok(SessionType::Theory),
            "LAB" | "L" => Ok(SessionType::Lab),
            "PRACTICAL" | "P" => Ok(SessionType::Practical),
            "TUTORIAL" | "TUT" => Ok(SessionType::Tutorial),
            other => Err(format!(
                "unknown session type '{}' (expected THEORY, LAB, PRACTICAL or TUTORIAL)",
                other
            )),
        }
    }
}

/// Identifier grouping the rows of one multi-period class
///
/// Stored as lowercase hex so it can double as a sled key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    /// Length of the hex representation
    pub const HEX_LEN: usize = 32;

    /// Derive a fresh span id for a placement
    ///
    /// SpanId = blake3("span:" || anchor || slots || counter || nanos), truncated to 16 bytes.
    pub fn generate(anchor: &str, slots: &[SlotIndex]) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let nonce = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"span:");
        hasher.update(anchor.as_bytes());
        hasher.update(b"slots:");
        hasher.update(slots);
        hasher.update(&nonce.to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        let digest = hasher.finalize();
        SpanId(hex::encode(&digest.as_bytes()[..Self::HEX_LEN / 2]))
    }

    /// Parse a span id supplied by a caller
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.len() != Self::HEX_LEN {
            return Err(format!(
                "span id must be {} hex characters, got {}",
                Self::HEX_LEN,
                raw.len()
            ));
        }
        hex::decode(&raw).map_err(|e| format!("span id is not valid hex: {}", e))?;
        Ok(SpanId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
