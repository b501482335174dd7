//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::auth::Caller;
use crate::cli::parse::{Commands, PlacementArgs, SectionArgs};
use crate::cli::presentation::{
    format_assign_outcome, format_catalog_json, format_catalog_text, format_clear_outcome,
    format_rebuild_summary, format_section_routine_json, format_section_routine_text,
    format_teacher_schedule_json, format_teacher_schedule_text,
};
use crate::config::{ConfigLoader, RoutineConfig};
use crate::engine::RoutineEngine;
use crate::error::{ApiError, StorageError};
use crate::projection::{ProjectionQueue, TeacherViewProjector, TeacherViewStore};
use crate::request::{ClearCellRequest, ClearSubjectRequest, PlacementRequest, ReassignSpanRequest};
use crate::routine::{SectionRef, SledRoutineStore};
use crate::types::SpanId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on waiting for queued projections before the process exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime context for CLI execution: store, engine, and projector for one workspace.
pub struct RunContext {
    engine: RoutineEngine,
    projector: TeacherViewProjector,
    store: SledRoutineStore,
    caller: Caller,
    workspace_root: PathBuf,
    drain_timeout: Duration,
}

impl RunContext {
    /// Load configuration: an explicit file, or the layered workspace lookup.
    pub fn load_config(
        workspace_root: &Path,
        config_path: Option<&Path>,
    ) -> Result<RoutineConfig, ApiError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(workspace_root)?,
        };
        config.validated()
    }

    /// Create run context from workspace root and optional config path.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        caller: Caller,
    ) -> Result<Self, ApiError> {
        let config = Self::load_config(&workspace_root, config_path.as_deref())?;

        let store_path = config.system.storage.resolve(&workspace_root);
        std::fs::create_dir_all(&store_path)
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;
        let db = sled::open(&store_path).map_err(|e| {
            ApiError::StoreUnavailable(format!(
                "Failed to open sled database at {}: {}",
                store_path.display(),
                e
            ))
        })?;

        let store = SledRoutineStore::from_db(db)?;
        let views = TeacherViewStore::new(store.db())?;
        let catalog = Arc::new(config.build_catalog()?);
        let registry = Arc::new(config.build_registry()?);
        let queue = Arc::new(ProjectionQueue::new(config.projector.max_queue_size));

        let engine = RoutineEngine::new(
            Arc::new(store.clone()),
            Arc::clone(&catalog),
            registry.clone(),
            Arc::clone(&queue),
            views.clone(),
        );
        let projector = TeacherViewProjector::new(
            queue,
            Arc::new(store.clone()),
            views,
            registry,
            catalog,
            config.projector.clone(),
        );

        debug!(store = %store_path.display(), caller = %caller.caller_id, "Run context ready");

        Ok(Self {
            engine,
            projector,
            store,
            caller,
            workspace_root,
            drain_timeout: DRAIN_TIMEOUT,
        })
    }

    /// Bound the wait for queued projections after a mutation
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &RoutineEngine {
        &self.engine
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    ///
    /// Mutations drain the projection queue before returning so teacher views
    /// are current when the process exits. A drain failure never turns a
    /// committed mutation into an error; stale views are rebuilt later.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        debug!(command = command.name(), "Executing command");
        let result = self.execute_inner(command).await;
        if command.is_mutation() {
            if let Err(err) = self.drain_projections().await {
                warn!(
                    command = command.name(),
                    error = %err,
                    pending = self.engine.queue().stats().pending,
                    "Teacher views were not fully projected"
                );
            }
            self.store.flush()?;
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Assign(args) => {
                let outcome = self.engine.assign(&self.caller, &placement_request(args))?;
                Ok(format_assign_outcome(&outcome))
            }
            Commands::ReassignSpan { span_id, placement } => {
                let request = ReassignSpanRequest {
                    span_id: parse_span_id(span_id)?,
                    placement: placement_request(placement),
                };
                let outcome = self.engine.reassign_span(&self.caller, &request)?;
                Ok(format_assign_outcome(&outcome))
            }
            Commands::ClearCell {
                section,
                day,
                slot,
                lab_group,
            } => {
                let request = ClearCellRequest {
                    program_code: section.program.clone(),
                    semester: section.semester,
                    section: section.section.clone(),
                    day_index: *day,
                    slot_index: *slot,
                    lab_group: lab_group.clone(),
                };
                let outcome = self.engine.clear_cell(&self.caller, &request)?;
                Ok(format_clear_outcome(&outcome))
            }
            Commands::ClearSpan { span_id } => {
                let outcome = self.engine.clear_span(&self.caller, &parse_span_id(span_id)?)?;
                Ok(format_clear_outcome(&outcome))
            }
            Commands::ClearSubject {
                section,
                subject_code,
            } => {
                let request = ClearSubjectRequest {
                    program_code: section.program.clone(),
                    semester: section.semester,
                    section: section.section.clone(),
                    subject_code: subject_code.clone(),
                };
                let outcome = self.engine.clear_subject(&self.caller, &request)?;
                Ok(format_clear_outcome(&outcome))
            }
            Commands::Show { section, format } => {
                let routine = self.engine.routine(&section_ref(section))?;
                match format.as_str() {
                    "json" => format_section_routine_json(&routine),
                    _ => Ok(format_section_routine_text(&routine, self.engine.catalog())),
                }
            }
            Commands::Teacher {
                teacher_id,
                format,
                refresh,
            } => {
                let view = if *refresh {
                    self.engine.registry().teacher_or_error(teacher_id)?;
                    self.projector.project_teacher(teacher_id)?
                } else {
                    self.engine.teacher_schedule(teacher_id)?
                };
                match format.as_str() {
                    "json" => format_teacher_schedule_json(&view),
                    _ => Ok(format_teacher_schedule_text(&view)),
                }
            }
            Commands::RebuildViews => {
                let before = self.projector.stats();
                let enqueued = self.engine.rebuild_all_views(&self.caller)?;
                self.drain_projections().await?;
                let after = self.projector.stats();
                Ok(format_rebuild_summary(
                    enqueued,
                    after.completed.saturating_sub(before.completed),
                    after.failed.saturating_sub(before.failed),
                ))
            }
            Commands::Catalog { program, format } => {
                if let Some(code) = program {
                    self.engine.registry().program_or_error(code)?;
                }
                match format.as_str() {
                    "json" => format_catalog_json(self.engine.catalog(), program.as_deref()),
                    _ => Ok(format_catalog_text(self.engine.catalog(), program.as_deref())),
                }
            }
        }
    }

    /// Run the projector until every queued job is done, then stop it
    async fn drain_projections(&self) -> Result<(), ApiError> {
        if self.engine.queue().is_idle() {
            return Ok(());
        }
        self.projector.start()?;
        let drained = self.projector.wait_for_idle(Some(self.drain_timeout)).await;
        self.projector.stop().await?;
        drained
    }
}

fn section_ref(args: &SectionArgs) -> SectionRef {
    SectionRef::new(args.program.clone(), args.semester, args.section.clone())
}

fn placement_request(args: &PlacementArgs) -> PlacementRequest {
    PlacementRequest {
        program_code: args.section.program.clone(),
        semester: args.section.semester,
        section: args.section.section.clone(),
        day_index: args.day,
        slot_indexes: args.slots.clone(),
        lab_group: args.lab_group.clone(),
        subject_id: args.subject.clone(),
        teacher_ids: args.teachers.clone(),
        room_id: args.room.clone(),
        session_type: args.session_type,
        notes: args.notes.clone(),
    }
}

fn parse_span_id(raw: &str) -> Result<SpanId, ApiError> {
    SpanId::parse(raw).map_err(|message| {
        let mut errors = crate::request::ValidationErrors::default();
        errors.push("span_id", message);
        ApiError::Validation(errors)
    })
}
