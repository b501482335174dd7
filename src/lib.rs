//! Routine: Class Timetable Assignment
//!
//! Places classes into a weekly (day, slot) grid for program sections,
//! rejects placements that double-book a teacher, a room, or a section
//! cell, and keeps an eventually consistent per-teacher schedule view.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod logging;
pub mod projection;
pub mod registry;
pub mod request;
pub mod routine;
pub mod types;
