//! Assignment Engine
//!
//! Orchestrates every routine mutation: validate the request, resolve the
//! referenced entities, run the Conflict Checker, commit the change set in
//! one store transaction, then enqueue teacher-view projections. A store
//! constraint firing after a clean check is a lost race; the whole operation
//! is retried once with a fresh check.

use crate::auth::Caller;
use crate::catalog::SlotCatalog;
use crate::conflict::check_conflicts;
use crate::error::ApiError;
use crate::projection::{ChangeKind, ProjectionQueue, TeacherScheduleView, TeacherViewStore};
use crate::registry::EntityRegistry;
use crate::request::{
    validate_section, ClearCellRequest, ClearSubjectRequest, PlacementRequest, ReassignSpanRequest,
};
use crate::routine::{ChangeSet, CellKey, RoutineSlotEntry, RoutineStore, SectionRef, SectionRoutine};
use crate::types::{SpanId, TeacherId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Attempts per mutation: the first try plus one retry after a lost race
const MAX_COMMIT_ATTEMPTS: usize = 2;

/// Rows committed by an assign or reassign
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignOutcome {
    /// Shared span id when the placement covers more than one slot
    pub span_id: Option<SpanId>,
    pub rows: Vec<RoutineSlotEntry>,
}

/// Result of a clear operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    pub deleted_count: usize,
    /// Distinct teachers of the deleted rows, sorted
    pub affected_teacher_ids: Vec<TeacherId>,
}

impl ClearOutcome {
    fn from_removed(removed: &[RoutineSlotEntry]) -> Self {
        Self {
            deleted_count: removed.len(),
            affected_teacher_ids: distinct_teachers(removed).into_iter().collect(),
        }
    }
}

fn distinct_teachers(rows: &[RoutineSlotEntry]) -> BTreeSet<TeacherId> {
    rows.iter()
        .flat_map(|r| r.teacher_ids.iter().cloned())
        .collect()
}

/// Routine assignment engine
pub struct RoutineEngine {
    store: Arc<dyn RoutineStore>,
    catalog: Arc<SlotCatalog>,
    registry: Arc<dyn EntityRegistry>,
    queue: Arc<ProjectionQueue>,
    views: TeacherViewStore,
}

impl RoutineEngine {
    pub fn new(
        store: Arc<dyn RoutineStore>,
        catalog: Arc<SlotCatalog>,
        registry: Arc<dyn EntityRegistry>,
        queue: Arc<ProjectionQueue>,
        views: TeacherViewStore,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
            queue,
            views,
        }
    }

    pub fn store(&self) -> &Arc<dyn RoutineStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<SlotCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<dyn EntityRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<ProjectionQueue> {
        &self.queue
    }

    pub fn views(&self) -> &TeacherViewStore {
        &self.views
    }

    /// Place a class in one slot or a contiguous run of slots
    pub fn assign(&self, caller: &Caller, request: &PlacementRequest) -> Result<AssignOutcome, ApiError> {
        let started = Instant::now();
        let result = self.assign_inner(caller, request);
        self.log_result("assign", caller, started, &result, |o| o.rows.len());
        result
    }

    fn assign_inner(&self, caller: &Caller, request: &PlacementRequest) -> Result<AssignOutcome, ApiError> {
        caller.verify_write()?;
        let request = request.normalized();
        request.validate()?;
        self.resolve_placement(&request)?;

        let outcome = self.with_race_retry("assign", || {
            let mut rows = request.to_rows();
            let report = check_conflicts(self.store.as_ref(), &self.catalog, &rows, None)?;
            if !report.is_empty() {
                return Err(ApiError::Conflict(report));
            }
            let span_id = attach_span(&mut rows);
            self.store.commit(&ChangeSet::insert_only(rows.clone()))?;
            Ok(AssignOutcome { span_id, rows })
        })?;

        let jobs = distinct_teachers(&outcome.rows)
            .into_iter()
            .map(|t| (t, ChangeKind::Upsert))
            .collect();
        self.enqueue_projections(jobs);
        Ok(outcome)
    }

    /// Replace every row of a span with a new placement
    pub fn reassign_span(
        &self,
        caller: &Caller,
        request: &ReassignSpanRequest,
    ) -> Result<AssignOutcome, ApiError> {
        let started = Instant::now();
        let result = self.reassign_span_inner(caller, request);
        self.log_result("reassign_span", caller, started, &result, |o| o.rows.len());
        result
    }

    fn reassign_span_inner(
        &self,
        caller: &Caller,
        request: &ReassignSpanRequest,
    ) -> Result<AssignOutcome, ApiError> {
        caller.verify_write()?;
        let placement = request.placement.normalized();
        placement.validate()?;
        self.resolve_placement(&placement)?;
        let span_id = &request.span_id;

        let (outcome, old_rows) = self.with_race_retry("reassign_span", || {
            let old_rows = self.store.span_entries(span_id)?;
            if old_rows.is_empty() {
                return Err(ApiError::SpanNotFound(span_id.clone()));
            }
            let mut rows = placement.to_rows();
            let report = check_conflicts(self.store.as_ref(), &self.catalog, &rows, Some(span_id))?;
            if !report.is_empty() {
                return Err(ApiError::Conflict(report));
            }
            let new_span = attach_span(&mut rows);
            let change = ChangeSet {
                removals: old_rows.iter().map(RoutineSlotEntry::key).collect(),
                inserts: rows.clone(),
            };
            let committed = self.store.commit(&change)?;
            Ok((
                AssignOutcome {
                    span_id: new_span,
                    rows,
                },
                committed.removed,
            ))
        })?;

        let mut jobs: BTreeMap<TeacherId, ChangeKind> = distinct_teachers(&old_rows)
            .into_iter()
            .map(|t| (t, ChangeKind::Delete))
            .collect();
        for teacher in distinct_teachers(&outcome.rows) {
            jobs.insert(teacher, ChangeKind::Upsert);
        }
        self.enqueue_projections(jobs);
        Ok(outcome)
    }

    /// Clear one cell; a cell inside a span clears the whole span
    ///
    /// `lab_group: None` addresses the whole-section entry only. An empty
    /// cell deletes nothing.
    pub fn clear_cell(&self, caller: &Caller, request: &ClearCellRequest) -> Result<ClearOutcome, ApiError> {
        let started = Instant::now();
        let result = self.clear_cell_inner(caller, request);
        self.log_result("clear_cell", caller, started, &result, |o| o.deleted_count);
        result
    }

    fn clear_cell_inner(&self, caller: &Caller, request: &ClearCellRequest) -> Result<ClearOutcome, ApiError> {
        caller.verify_write()?;
        request.validate()?;
        let key = request.key();

        self.clear_with(|| {
            let Some(entry) = self.store.get(&key)? else {
                return Ok(Vec::new());
            };
            match &entry.span_id {
                Some(span) => {
                    let mut keys: Vec<CellKey> = self
                        .store
                        .span_entries(span)?
                        .iter()
                        .map(RoutineSlotEntry::key)
                        .collect();
                    if !keys.contains(&key) {
                        keys.push(key.clone());
                    }
                    Ok(keys)
                }
                None => Ok(vec![key.clone()]),
            }
        })
    }

    /// Delete every row of a span; an unknown span deletes nothing
    pub fn clear_span(&self, caller: &Caller, span_id: &SpanId) -> Result<ClearOutcome, ApiError> {
        let started = Instant::now();
        let result = self.clear_span_inner(caller, span_id);
        self.log_result("clear_span", caller, started, &result, |o| o.deleted_count);
        result
    }

    fn clear_span_inner(&self, caller: &Caller, span_id: &SpanId) -> Result<ClearOutcome, ApiError> {
        caller.verify_write()?;
        self.clear_with(|| {
            Ok(self
                .store
                .span_entries(span_id)?
                .iter()
                .map(RoutineSlotEntry::key)
                .collect())
        })
    }

    /// Delete every row of a section whose subject carries `subject_code`
    pub fn clear_subject(
        &self,
        caller: &Caller,
        request: &ClearSubjectRequest,
    ) -> Result<ClearOutcome, ApiError> {
        let started = Instant::now();
        let result = self.clear_subject_inner(caller, request);
        self.log_result("clear_subject", caller, started, &result, |o| o.deleted_count);
        result
    }

    fn clear_subject_inner(
        &self,
        caller: &Caller,
        request: &ClearSubjectRequest,
    ) -> Result<ClearOutcome, ApiError> {
        caller.verify_write()?;
        request.validate()?;
        let section = request.section_ref();
        self.registry.program_or_error(&section.program_code)?;

        let subject_code = request.subject_code.trim();
        let subject_ids: BTreeSet<String> = self
            .registry
            .subjects_by_code(subject_code)
            .into_iter()
            .map(|s| s.id.clone())
            .collect();
        if subject_ids.is_empty() {
            return Err(ApiError::SubjectNotFound(subject_code.to_string()));
        }

        self.clear_with(|| {
            let mut keys = BTreeSet::new();
            let mut spans = BTreeSet::new();
            for row in self.store.section_entries(&section)? {
                if subject_ids.contains(&row.subject_id) {
                    keys.insert(row.key());
                    if let Some(span) = &row.span_id {
                        spans.insert(span.clone());
                    }
                }
            }
            for span in &spans {
                for member in self.store.span_entries(span)? {
                    keys.insert(member.key());
                }
            }
            Ok(keys.into_iter().collect())
        })
    }

    /// Section routine: day → slot → entries with display names
    pub fn routine(&self, section: &SectionRef) -> Result<SectionRoutine, ApiError> {
        let section = SectionRef::new(
            section.program_code.trim(),
            section.semester,
            section.section.trim(),
        );
        validate_section(&section)?;
        self.registry.program_or_error(&section.program_code)?;
        let entries = self.store.section_entries(&section)?;
        Ok(SectionRoutine::build(
            section,
            entries,
            self.registry.as_ref(),
            &self.catalog,
        ))
    }

    /// Cached weekly schedule of a teacher
    ///
    /// Eventually consistent with the routine; a teacher nobody has
    /// projected yet gets an empty view.
    pub fn teacher_schedule(&self, teacher_id: &str) -> Result<TeacherScheduleView, ApiError> {
        self.registry.teacher_or_error(teacher_id)?;
        match self.views.get(teacher_id)? {
            Some(view) => Ok(view),
            None => Ok(TeacherScheduleView::empty(teacher_id, self.registry.as_ref())),
        }
    }

    /// Enqueue a rebuild of every known teacher's view
    ///
    /// Returns the number of teachers enqueued. Teachers the queue refuses
    /// are logged and left out of the count.
    pub fn rebuild_all_views(&self, caller: &Caller) -> Result<usize, ApiError> {
        caller.verify_admin()?;
        let mut teachers: BTreeSet<TeacherId> = self.registry.teacher_ids().into_iter().collect();
        teachers.extend(self.views.teacher_ids()?);
        let jobs = teachers
            .into_iter()
            .map(|t| (t, ChangeKind::Upsert))
            .collect::<BTreeMap<_, _>>();
        let requested = jobs.len();
        let enqueued = self.enqueue_projections(jobs);
        if enqueued < requested {
            warn!(
                requested,
                enqueued,
                "Projection queue refused part of the view rebuild"
            );
        }
        info!(
            caller = %caller.caller_id,
            teachers = enqueued,
            "Enqueued rebuild of all teacher views"
        );
        Ok(enqueued)
    }

    /// Every referenced entity must exist and the section must fit its program
    fn resolve_placement(&self, request: &PlacementRequest) -> Result<(), ApiError> {
        let program = self.registry.program_or_error(&request.program_code)?;
        let mut errors = crate::request::ValidationErrors::default();
        if let Some(max) = program.semesters {
            if request.semester > max {
                errors.push(
                    "semester",
                    format!("program {} has {} semesters", program.code, max),
                );
            }
        }
        if !program.sections.is_empty() && !program.sections.contains(&request.section) {
            errors.push(
                "section",
                format!("section {} is not part of program {}", request.section, program.code),
            );
        }
        errors.into_result()?;

        self.registry.subject_or_error(&request.subject_id)?;
        for teacher in &request.teacher_ids {
            self.registry.teacher_or_error(teacher)?;
        }
        self.registry.room_or_error(&request.room_id)?;
        Ok(())
    }

    /// Run `attempt`, retrying once when the store reports a lost race
    fn with_race_retry<T>(
        &self,
        operation: &str,
        mut attempt: impl FnMut() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut tries = 1;
        loop {
            match attempt() {
                Err(ApiError::RaceDetected(reason)) if tries < MAX_COMMIT_ATTEMPTS => {
                    warn!(operation, reason = %reason, "Concurrent write detected, retrying with a fresh check");
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    /// Remove the keys chosen by `select` and project the affected teachers
    fn clear_with(
        &self,
        mut select: impl FnMut() -> Result<Vec<CellKey>, ApiError>,
    ) -> Result<ClearOutcome, ApiError> {
        let removed = self.with_race_retry("clear", || {
            let keys = select()?;
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.store.commit(&ChangeSet::remove_only(keys))?.removed)
        })?;

        let outcome = ClearOutcome::from_removed(&removed);
        let jobs = outcome
            .affected_teacher_ids
            .iter()
            .map(|t| (t.clone(), ChangeKind::Delete))
            .collect();
        self.enqueue_projections(jobs);
        Ok(outcome)
    }

    /// Enqueue one job per teacher; failures are logged, never returned
    ///
    /// Returns how many jobs the queue accepted.
    fn enqueue_projections(&self, jobs: BTreeMap<TeacherId, ChangeKind>) -> usize {
        let mut accepted = 0;
        for (teacher, change) in jobs {
            match self.queue.enqueue(&teacher, change) {
                Ok(_) => accepted += 1,
                Err(err) => warn!(
                    teacher_id = %teacher,
                    change = %change,
                    error = %err,
                    "Failed to enqueue teacher view projection"
                ),
            }
        }
        accepted
    }

    fn log_result<T>(
        &self,
        operation: &str,
        caller: &Caller,
        started: Instant,
        result: &Result<T, ApiError>,
        rows: impl Fn(&T) -> usize,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(value) => info!(
                caller = %caller.caller_id,
                operation,
                rows = rows(value),
                duration_ms,
                "Routine mutation committed"
            ),
            Err(ApiError::Conflict(report)) => warn!(
                caller = %caller.caller_id,
                operation,
                conflicts = report.len(),
                duration_ms,
                "Placement rejected: {}",
                report
            ),
            Err(err @ ApiError::RaceDetected(_)) => warn!(
                caller = %caller.caller_id,
                operation,
                error = %err,
                duration_ms,
                "Routine mutation lost a race twice"
            ),
            Err(
                err @ (ApiError::StoreUnavailable(_) | ApiError::StorageError(_)),
            ) => error!(
                caller = %caller.caller_id,
                operation,
                error = %err,
                duration_ms,
                "Routine mutation failed in storage"
            ),
            Err(err) => debug!(
                caller = %caller.caller_id,
                operation,
                error = %err,
                "Routine mutation refused"
            ),
        }
    }
}

/// Give a multi-row placement a fresh shared span id
fn attach_span(rows: &mut [RoutineSlotEntry]) -> Option<SpanId> {
    if rows.len() < 2 {
        return None;
    }
    let slots: Vec<_> = rows.iter().map(|r| r.slot_index).collect();
    let span = SpanId::generate(&rows[0].key().encode(), &slots);
    for row in rows.iter_mut() {
        row.span_id = Some(span.clone());
    }
    Some(span)
}
