//! Client-side controllers for the waveform rendering service.
//!
//! The service renders an animation job asynchronously: a submission returns
//! an opaque job id, the client polls the job's status until it terminates,
//! then fetches the finished artifact in a separate request. [`JobController`]
//! owns that lifecycle as an explicit state machine (Idle → Submitting →
//! Polling → Ready/Failed) and broadcasts every transition to subscribers.
//! [`sync_render::SyncRenderController`] is the legacy one-shot path.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared::domain::{JobId, JobState, RenderArtifact, RenderParameters};

pub mod color;
pub mod config;
pub mod poll;
pub mod sync_render;
pub mod transport;

pub use color::{ColorSelection, Rgba};
pub use config::ClientSettings;
pub use poll::{PollOutcome, PollScheduler, TickOutcome};
pub use sync_render::SyncRenderController;
pub use transport::{HttpRenderBackend, RenderBackend, TransportError};

/// Coarse lifecycle position, for caller affordance logic (e.g. disabling a
/// submit button while a job is active).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Submitting,
    Polling,
    Ready,
    Failed,
}

/// Terminal failure reason for one job lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job submission failed: {0}")]
    Submit(String),
    #[error("status poll failed: {0}")]
    Poll(String),
    #[error("service reported failure: {0}")]
    ServerReported(String),
    #[error("artifact fetch failed: {0}")]
    ArtifactFetch(String),
    #[error("job still unfinished after {ticks} status checks")]
    TimedOut { ticks: u32 },
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum StartError {
    /// A job is already Submitting or Polling. The running lifecycle is left
    /// untouched; callers wanting takeover semantics cancel first.
    #[error("a render job is already in flight")]
    JobInFlight,
    /// The previous job finished but its outcome has not been acknowledged.
    #[error("controller holds a finished job; call reset() first")]
    NotReset,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ResetError {
    #[error("reset is only valid from Ready or Failed")]
    NotTerminal,
}

/// State-change notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Submitting,
    Polling { job_id: JobId },
    /// One non-terminal status tick was applied. Unrecognized status strings
    /// surface here as [`JobState::Other`].
    Status { job_id: JobId, state: JobState },
    Ready { artifact: RenderArtifact },
    Failed { error: JobError },
    /// The controller returned to Idle (cancel or reset).
    Idle,
}

enum Phase {
    Idle,
    Submitting,
    Polling { job_id: JobId },
    Ready { artifact: RenderArtifact },
    Failed { error: JobError },
}

impl Phase {
    fn snapshot(&self) -> JobPhase {
        match self {
            Phase::Idle => JobPhase::Idle,
            Phase::Submitting => JobPhase::Submitting,
            Phase::Polling { .. } => JobPhase::Polling,
            Phase::Ready { .. } => JobPhase::Ready,
            Phase::Failed { .. } => JobPhase::Failed,
        }
    }
}

struct ControllerInner {
    phase: Phase,
    /// Bumped on every start() and cancel(). Transitions carry the generation
    /// they were started under and are discarded when it no longer matches,
    /// so a response that was in flight when the caller cancelled can never
    /// mutate a newer lifecycle's state.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Drives a single asynchronous render job at a time.
///
/// At most one job is owned by a controller instance; `start()` while a job
/// is active is rejected (see [`StartError`]). All transitions are announced
/// on the broadcast channel returned by [`JobController::subscribe`].
pub struct JobController {
    backend: Arc<dyn RenderBackend>,
    scheduler: PollScheduler,
    inner: Mutex<ControllerInner>,
    events: broadcast::Sender<JobEvent>,
}

impl JobController {
    pub fn new(backend: Arc<dyn RenderBackend>, scheduler: PollScheduler) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            backend,
            scheduler,
            inner: Mutex::new(ControllerInner {
                phase: Phase::Idle,
                generation: 0,
                task: None,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> JobPhase {
        self.inner.lock().await.phase.snapshot()
    }

    /// The finished artifact, while in Ready.
    pub async fn artifact(&self) -> Option<RenderArtifact> {
        match &self.inner.lock().await.phase {
            Phase::Ready { artifact } => Some(artifact.clone()),
            _ => None,
        }
    }

    /// The failure reason, while in Failed.
    pub async fn last_error(&self) -> Option<JobError> {
        match &self.inner.lock().await.phase {
            Phase::Failed { error } => Some(error.clone()),
            _ => None,
        }
    }

    /// Submits a new job and begins polling it. Valid only from Idle.
    pub async fn start(self: &Arc<Self>, params: RenderParameters) -> Result<(), StartError> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            Phase::Idle => {}
            Phase::Submitting | Phase::Polling { .. } => return Err(StartError::JobInFlight),
            Phase::Ready { .. } | Phase::Failed { .. } => return Err(StartError::NotReset),
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.phase = Phase::Submitting;
        let _ = self.events.send(JobEvent::Submitting);

        let controller = Arc::clone(self);
        inner.task = Some(tokio::spawn(async move {
            controller.run_job(generation, params).await;
        }));
        Ok(())
    }

    /// Stops the active lifecycle, if any, and returns to Idle without
    /// raising an error. The result of any request still in flight is
    /// discarded when it eventually resolves.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            Phase::Submitting | Phase::Polling { .. } => {}
            _ => return,
        }

        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.phase = Phase::Idle;
        info!("render job cancelled");
        let _ = self.events.send(JobEvent::Idle);
    }

    /// Acknowledges a terminal outcome, discarding the stored artifact or
    /// error, and returns to Idle.
    pub async fn reset(&self) -> Result<(), ResetError> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            Phase::Ready { .. } | Phase::Failed { .. } => {
                inner.phase = Phase::Idle;
                inner.task = None;
                let _ = self.events.send(JobEvent::Idle);
                Ok(())
            }
            _ => Err(ResetError::NotTerminal),
        }
    }

    async fn run_job(self: Arc<Self>, generation: u64, params: RenderParameters) {
        let job_id = match self.backend.submit_job(&params).await {
            Ok(job_id) => job_id,
            Err(err) => {
                self.finish_failed(generation, JobError::Submit(err.to_string()))
                    .await;
                return;
            }
        };

        if !self.enter_polling(generation, job_id.clone()).await {
            return;
        }

        let outcome = self
            .scheduler
            .run(|tick| {
                let controller = Arc::clone(&self);
                let job_id = job_id.clone();
                async move { controller.poll_once(generation, &job_id, tick).await }
            })
            .await;

        if let PollOutcome::Exhausted { ticks } = outcome {
            self.finish_failed(generation, JobError::TimedOut { ticks })
                .await;
        }
    }

    async fn poll_once(&self, generation: u64, job_id: &JobId, tick: u32) -> TickOutcome {
        let payload = match self.backend.fetch_status(job_id).await {
            Ok(payload) => payload,
            Err(err) => {
                self.finish_failed(generation, JobError::Poll(err.to_string()))
                    .await;
                return TickOutcome::Stop;
            }
        };

        match payload.status {
            JobState::Error => {
                let message = payload
                    .message
                    .unwrap_or_else(|| "unknown error".to_string());
                self.finish_failed(generation, JobError::ServerReported(message))
                    .await;
                TickOutcome::Stop
            }
            JobState::Done => {
                // A completed-but-unfetchable job is a terminal failure; the
                // artifact fetch is attempted exactly once.
                match self.backend.fetch_artifact(job_id).await {
                    Ok(artifact) => self.finish_ready(generation, artifact).await,
                    Err(err) => {
                        self.finish_failed(generation, JobError::ArtifactFetch(err.to_string()))
                            .await;
                    }
                }
                TickOutcome::Stop
            }
            JobState::Pending => {
                self.apply_tick(generation, job_id, tick, JobState::Pending)
                    .await
            }
            JobState::Other(raw) => {
                warn!(job_id = %job_id, status = %raw, "unrecognized job status, treating as pending");
                self.apply_tick(generation, job_id, tick, JobState::Other(raw))
                    .await
            }
        }
    }

    /// Applies a non-terminal tick. Returns Stop if this lifecycle has been
    /// superseded in the meantime.
    async fn apply_tick(
        &self,
        generation: u64,
        job_id: &JobId,
        tick: u32,
        state: JobState,
    ) -> TickOutcome {
        let inner = self.inner.lock().await;
        if inner.generation != generation {
            return TickOutcome::Stop;
        }
        debug!(job_id = %job_id, tick, state = %state, "job still in progress");
        let _ = self.events.send(JobEvent::Status {
            job_id: job_id.clone(),
            state,
        });
        TickOutcome::Continue
    }

    async fn enter_polling(&self, generation: u64, job_id: JobId) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(job_id = %job_id, "discarding submit result for a cancelled job");
            return false;
        }
        info!(job_id = %job_id, "job accepted, polling for completion");
        inner.phase = Phase::Polling {
            job_id: job_id.clone(),
        };
        let _ = self.events.send(JobEvent::Polling { job_id });
        true
    }

    async fn finish_ready(&self, generation: u64, artifact: RenderArtifact) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        info!(
            bytes = artifact.bytes.len(),
            content_type = %artifact.content_type,
            "render job completed"
        );
        let _ = self.events.send(JobEvent::Ready {
            artifact: artifact.clone(),
        });
        inner.phase = Phase::Ready { artifact };
        inner.task = None;
    }

    async fn finish_failed(&self, generation: u64, error: JobError) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!("discarding failure for a cancelled job: {error}");
            return;
        }
        warn!("render job failed: {error}");
        let _ = self.events.send(JobEvent::Failed {
            error: error.clone(),
        });
        inner.phase = Phase::Failed { error };
        inner.task = None;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
