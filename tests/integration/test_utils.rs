//! Shared test utilities for integration tests
//!
//! A seeded engine over a throwaway sled store, plus environment isolation
//! for tests that exercise config discovery.

use routine::auth::{Caller, Role};
use routine::catalog::SlotCatalog;
use routine::engine::RoutineEngine;
use routine::projection::{ProjectionQueue, ProjectorConfig, TeacherViewProjector, TeacherViewStore};
use routine::registry::{
    InMemoryRegistry, ProgramRecord, RoomRecord, SubjectRecord, TeacherRecord,
};
use routine::request::{ClearCellRequest, PlacementRequest};
use routine::routine::{RoutineStore, SledRoutineStore};
use routine::types::{DayIndex, SessionType, SlotIndex};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        match self.home {
            Some(orig) => std::env::set_var("HOME", orig),
            None => std::env::remove_var("HOME"),
        }
        match self.xdg_config_home {
            Some(orig) => std::env::set_var("XDG_CONFIG_HOME", orig),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`
///
/// Serialized against every other environment-touching test; the original
/// values are restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    env_state.restore();
    result
}

/// Take the environment lock without changing anything
pub fn with_env_lock<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    f()
}

pub fn seeded_registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.register_program(ProgramRecord {
        code: "BCT".to_string(),
        name: "Computer Engineering".to_string(),
        semesters: Some(8),
        sections: vec!["AB".to_string(), "CD".to_string()],
    });
    registry.register_program(ProgramRecord {
        code: "BEL".to_string(),
        name: "Electrical Engineering".to_string(),
        semesters: Some(8),
        sections: vec![],
    });
    for (id, name) in [
        ("T1", "Asha Karki"),
        ("T2", "Bikash Thapa"),
        ("T3", "Chandra Rai"),
        ("T4", "Dipa Gurung"),
    ] {
        registry.register_teacher(TeacherRecord {
            id: id.to_string(),
            name: name.to_string(),
            department: Some("DOECE".to_string()),
        });
    }
    for (id, name) in [("R1", "Room 101"), ("R2", "Room 102"), ("L1", "Lab 1"), ("L2", "Lab 2")] {
        registry.register_room(RoomRecord {
            id: id.to_string(),
            name: name.to_string(),
            capacity: Some(48),
        });
    }
    for (id, code, name) in [
        ("S1", "CT461", "Computer Graphics"),
        ("S2", "CT462", "Data Mining"),
        ("S3", "EX451", "Instrumentation"),
    ] {
        registry.register_subject(SubjectRecord {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
        });
    }
    registry
}

/// Engine plus everything a test needs to inspect it
pub struct Harness {
    pub engine: RoutineEngine,
    pub store: SledRoutineStore,
    pub views: TeacherViewStore,
    pub queue: Arc<ProjectionQueue>,
    pub registry: Arc<InMemoryRegistry>,
    pub catalog: Arc<SlotCatalog>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SledRoutineStore::new(dir.path()).unwrap();
        Self::with_store(dir, store.clone(), Arc::new(store))
    }

    /// Build a harness whose engine writes through `engine_store`
    pub fn with_store(dir: TempDir, store: SledRoutineStore, engine_store: Arc<dyn RoutineStore>) -> Self {
        let views = TeacherViewStore::new(store.db()).unwrap();
        let queue = Arc::new(ProjectionQueue::new(1000));
        let registry = Arc::new(seeded_registry());
        let catalog = Arc::new(SlotCatalog::default());
        let engine = RoutineEngine::new(
            engine_store,
            Arc::clone(&catalog),
            registry.clone(),
            Arc::clone(&queue),
            views.clone(),
        );
        Self {
            engine,
            store,
            views,
            queue,
            registry,
            catalog,
            _dir: dir,
        }
    }

    pub fn projector(&self) -> TeacherViewProjector {
        TeacherViewProjector::new(
            Arc::clone(&self.queue),
            Arc::new(self.store.clone()),
            self.views.clone(),
            self.registry.clone(),
            Arc::clone(&self.catalog),
            ProjectorConfig {
                retry_base_delay_ms: 1,
                retry_max_delay_ms: 10,
                ..ProjectorConfig::default()
            },
        )
    }
}

pub fn editor() -> Caller {
    Caller::new("editor@campus", Role::Editor)
}

pub fn admin() -> Caller {
    Caller::new("admin@campus", Role::Admin)
}

pub fn viewer() -> Caller {
    Caller::new("viewer@campus", Role::Viewer)
}

/// Theory class of S1 for BCT semester 3
pub fn placement(
    section: &str,
    day: DayIndex,
    slots: &[SlotIndex],
    teachers: &[&str],
    room: &str,
) -> PlacementRequest {
    PlacementRequest {
        program_code: "BCT".to_string(),
        semester: 3,
        section: section.to_string(),
        day_index: day,
        slot_indexes: slots.to_vec(),
        lab_group: None,
        subject_id: "S1".to_string(),
        teacher_ids: teachers.iter().map(|t| t.to_string()).collect(),
        room_id: room.to_string(),
        session_type: SessionType::Theory,
        notes: None,
    }
}

pub fn lab_placement(
    section: &str,
    day: DayIndex,
    slots: &[SlotIndex],
    group: Option<&str>,
    teacher: &str,
    room: &str,
) -> PlacementRequest {
    PlacementRequest {
        lab_group: group.map(|g| g.to_string()),
        subject_id: "S2".to_string(),
        session_type: SessionType::Lab,
        ..placement(section, day, slots, &[teacher], room)
    }
}

pub fn clear_cell_request(
    section: &str,
    day: DayIndex,
    slot: SlotIndex,
    group: Option<&str>,
) -> ClearCellRequest {
    ClearCellRequest {
        program_code: "BCT".to_string(),
        semester: 3,
        section: section.to_string(),
        day_index: day,
        slot_index: slot,
        lab_group: group.map(|g| g.to_string()),
    }
}

/// Campus registry and catalog as a workspace would configure them
pub const CAMPUS_CONFIG: &str = r#"
[system.storage]
store_path = "data/store"

[projector]
retry_base_delay_ms = 1
retry_max_delay_ms = 10

[[catalog.programs]]
code = "BEL"
days = [0, 1, 2, 3, 4]

[[registry.programs]]
code = "BCT"
name = "Computer Engineering"
semesters = 8
sections = ["AB", "CD"]

[[registry.programs]]
code = "BEL"
name = "Electrical Engineering"
semesters = 8

[[registry.teachers]]
id = "T1"
name = "Asha Karki"

[[registry.teachers]]
id = "T2"
name = "Bikash Thapa"

[[registry.rooms]]
id = "R1"
name = "Room 101"

[[registry.rooms]]
id = "R2"
name = "Room 102"

[[registry.subjects]]
id = "S1"
code = "CT461"
name = "Computer Graphics"
"#;

/// Write `CAMPUS_CONFIG` to `<workspace>/config/config.toml`
pub fn write_workspace_config(workspace: &std::path::Path) -> std::path::PathBuf {
    let config_dir = workspace.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("config.toml");
    std::fs::write(&path, CAMPUS_CONFIG).unwrap();
    path
}
