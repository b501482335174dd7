//! Entity Registry
//!
//! Read-only lookups for teachers, rooms, subjects, and programs. The engine
//! consumes identity and display metadata from here; maintaining the
//! reference data itself happens elsewhere.

use crate::error::ApiError;
use crate::types::{ProgramCode, RoomId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRecord {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: SubjectId,
    /// Catalog code, e.g. `CT461`
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub code: ProgramCode,
    pub name: String,
    /// Number of semesters; `None` accepts any semester >= 1
    #[serde(default)]
    pub semesters: Option<u8>,
    /// Known sections; empty accepts any section name
    #[serde(default)]
    pub sections: Vec<String>,
}

/// Registry configuration section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub teachers: Vec<TeacherRecord>,
    #[serde(default)]
    pub rooms: Vec<RoomRecord>,
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,
    #[serde(default)]
    pub programs: Vec<ProgramRecord>,
}

/// Lookup interface consumed by the engine and the projector
pub trait EntityRegistry: Send + Sync {
    fn teacher(&self, id: &str) -> Option<&TeacherRecord>;
    fn room(&self, id: &str) -> Option<&RoomRecord>;
    fn subject(&self, id: &str) -> Option<&SubjectRecord>;
    fn program(&self, code: &str) -> Option<&ProgramRecord>;
    /// All subjects carrying a catalog code (a code may map to several ids)
    fn subjects_by_code(&self, code: &str) -> Vec<&SubjectRecord>;
    /// Every registered teacher id, sorted
    fn teacher_ids(&self) -> Vec<TeacherId>;

    fn teacher_or_error(&self, id: &str) -> Result<&TeacherRecord, ApiError> {
        self.teacher(id)
            .ok_or_else(|| ApiError::TeacherNotFound(id.to_string()))
    }

    fn room_or_error(&self, id: &str) -> Result<&RoomRecord, ApiError> {
        self.room(id)
            .ok_or_else(|| ApiError::RoomNotFound(id.to_string()))
    }

    fn subject_or_error(&self, id: &str) -> Result<&SubjectRecord, ApiError> {
        self.subject(id)
            .ok_or_else(|| ApiError::SubjectNotFound(id.to_string()))
    }

    fn program_or_error(&self, code: &str) -> Result<&ProgramRecord, ApiError> {
        self.program(code)
            .ok_or_else(|| ApiError::ProgramNotFound(code.to_string()))
    }
}

/// In-memory registry built from configuration
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    teachers: BTreeMap<TeacherId, TeacherRecord>,
    rooms: HashMap<RoomId, RoomRecord>,
    subjects: HashMap<SubjectId, SubjectRecord>,
    programs: HashMap<ProgramCode, ProgramRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record from configuration; duplicate ids are rejected
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ApiError> {
        let mut registry = Self::new();
        for teacher in &config.teachers {
            if registry.teachers.contains_key(&teacher.id) {
                return Err(duplicate("teacher", &teacher.id));
            }
            registry.register_teacher(teacher.clone());
        }
        for room in &config.rooms {
            if registry.rooms.contains_key(&room.id) {
                return Err(duplicate("room", &room.id));
            }
            registry.register_room(room.clone());
        }
        for subject in &config.subjects {
            if registry.subjects.contains_key(&subject.id) {
                return Err(duplicate("subject", &subject.id));
            }
            registry.register_subject(subject.clone());
        }
        for program in &config.programs {
            if registry.programs.contains_key(&program.code) {
                return Err(duplicate("program", &program.code));
            }
            registry.register_program(program.clone());
        }
        Ok(registry)
    }

    pub fn register_teacher(&mut self, record: TeacherRecord) {
        self.teachers.insert(record.id.clone(), record);
    }

    pub fn register_room(&mut self, record: RoomRecord) {
        self.rooms.insert(record.id.clone(), record);
    }

    pub fn register_subject(&mut self, record: SubjectRecord) {
        self.subjects.insert(record.id.clone(), record);
    }

    pub fn register_program(&mut self, record: ProgramRecord) {
        self.programs.insert(record.code.clone(), record);
    }
}

fn duplicate(kind: &str, id: &str) -> ApiError {
    ApiError::ConfigError(format!("duplicate {} id '{}' in registry", kind, id))
}

impl EntityRegistry for InMemoryRegistry {
    fn teacher(&self, id: &str) -> Option<&TeacherRecord> {
        self.teachers.get(id)
    }

    fn room(&self, id: &str) -> Option<&RoomRecord> {
        self.rooms.get(id)
    }

    fn subject(&self, id: &str) -> Option<&SubjectRecord> {
        self.subjects.get(id)
    }

    fn program(&self, code: &str) -> Option<&ProgramRecord> {
        self.programs.get(code)
    }

    fn subjects_by_code(&self, code: &str) -> Vec<&SubjectRecord> {
        let mut matches: Vec<&SubjectRecord> = self
            .subjects
            .values()
            .filter(|s| s.code.eq_ignore_ascii_case(code))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    fn teacher_ids(&self) -> Vec<TeacherId> {
        self.teachers.keys().cloned().collect()
    }
}
