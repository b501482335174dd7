//! Projection worker
//!
//! Single background consumer of the projection queue. One consumer keeps
//! per-teacher ordering: a job enqueued while the same teacher is being
//! projected waits until that projection is finished.

use crate::catalog::SlotCatalog;
use crate::error::ApiError;
use crate::projection::{
    ProjectionJob, ProjectionQueue, ProjectorConfig, QueueStats, TeacherScheduleView,
    TeacherViewStore,
};
use crate::registry::EntityRegistry;
use crate::routine::RoutineStore;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Everything the worker needs to rebuild a view
struct ProjectionContext {
    queue: Arc<ProjectionQueue>,
    routine: Arc<dyn RoutineStore>,
    views: TeacherViewStore,
    registry: Arc<dyn EntityRegistry>,
    catalog: Arc<SlotCatalog>,
    config: ProjectorConfig,
}

impl ProjectionContext {
    fn project(&self, teacher_id: &str) -> Result<TeacherScheduleView, ApiError> {
        let entries = self.routine.teacher_entries(teacher_id)?;
        let view = TeacherScheduleView::build(
            teacher_id,
            &entries,
            self.registry.as_ref(),
            self.catalog.as_ref(),
        );
        self.views.put(&view)?;
        Ok(view)
    }
}

/// Teacher-view projector
pub struct TeacherViewProjector {
    context: Arc<ProjectionContext>,
    running: Arc<RwLock<bool>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TeacherViewProjector {
    pub fn new(
        queue: Arc<ProjectionQueue>,
        routine: Arc<dyn RoutineStore>,
        views: TeacherViewStore,
        registry: Arc<dyn EntityRegistry>,
        catalog: Arc<SlotCatalog>,
        config: ProjectorConfig,
    ) -> Self {
        Self {
            context: Arc::new(ProjectionContext {
                queue,
                routine,
                views,
                registry,
                catalog,
                config,
            }),
            running: Arc::new(RwLock::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start the background consumer on the current tokio runtime
    pub fn start(&self) -> Result<(), ApiError> {
        let mut running = self.running.write();
        if *running {
            return Ok(()); // Already running
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ApiError::ProjectionError("projector must be started inside a tokio runtime".to_string())
        })?;
        *running = true;
        drop(running);

        let context = Arc::clone(&self.context);
        let running = Arc::clone(&self.running);
        let handle = runtime.spawn(async move {
            Self::worker_loop(context, running).await;
        });
        *self.worker.lock() = Some(handle);

        info!("Started teacher-view projector");
        Ok(())
    }

    /// Stop the consumer after its in-flight job (graceful shutdown)
    pub async fn stop(&self) -> Result<(), ApiError> {
        {
            let mut running = self.running.write();
            if !*running {
                return Ok(()); // Already stopped
            }
            *running = false;
        }
        self.context.queue.wake();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| ApiError::ProjectionError(format!("projector task failed: {}", e)))?;
        }

        info!("Stopped teacher-view projector");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Wait until every queued job has been projected
    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> Result<(), ApiError> {
        self.context.queue.wait_for_idle(timeout).await
    }

    pub fn stats(&self) -> QueueStats {
        self.context.queue.stats()
    }

    /// Rebuild one teacher's view immediately, bypassing the queue
    pub fn project_teacher(&self, teacher_id: &str) -> Result<TeacherScheduleView, ApiError> {
        self.context.project(teacher_id)
    }

    async fn worker_loop(context: Arc<ProjectionContext>, running: Arc<RwLock<bool>>) {
        debug!("Projection worker started");

        while *running.read() {
            let Some(job) = context.queue.next_job() else {
                context.queue.wait_for_work(IDLE_POLL).await;
                continue;
            };
            Self::process_job(&context, job).await;
        }

        debug!("Projection worker stopped");
    }

    async fn process_job(context: &ProjectionContext, job: ProjectionJob) {
        let started = Instant::now();
        debug!(
            teacher_id = %job.teacher_id,
            change = %job.change,
            attempt = job.retry_count + 1,
            "Projecting teacher view"
        );

        match context.project(&job.teacher_id) {
            Ok(view) => {
                context.queue.complete(true);
                debug!(
                    teacher_id = %job.teacher_id,
                    items = view.item_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    queued_ms = job.enqueued_at.elapsed().as_millis() as u64,
                    "Projected teacher view"
                );
            }
            Err(err) => {
                let retry = job.retry_count < context.config.max_retry_attempts
                    && Self::is_retryable_error(&err);
                if retry {
                    let delay = context.config.backoff_ms(job.retry_count + 1);
                    warn!(
                        teacher_id = %job.teacher_id,
                        retry_count = job.retry_count,
                        delay_ms = delay,
                        error = %err,
                        "Teacher view projection failed, retrying"
                    );
                    sleep(Duration::from_millis(delay)).await;
                    context.queue.requeue(job);
                } else {
                    context.queue.complete(false);
                    error!(
                        teacher_id = %job.teacher_id,
                        retry_count = job.retry_count,
                        error = %err,
                        "Teacher view projection failed permanently"
                    );
                }
            }
        }
    }

    fn is_retryable_error(error: &ApiError) -> bool {
        match error {
            ApiError::StorageError(_) => false, // Corrupt rows stay corrupt
            ApiError::ConfigError(_) => false,
            _ => true,
        }
    }
}
