//! Background job execution.
//!
//! [`CopyEngine`] runs one job at a time on a dedicated thread and streams its
//! events back over crossbeam channels. The worker owns all running counters;
//! controllers only ever see them through events.

use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use uuid::Uuid;

use crate::capacity::{FilesystemProbe, SpaceProbe};
use crate::config::EngineConfig;
use crate::error::{EngineError, FileFailure};
use crate::job::{run_job, CancelToken, JobOutcome};
use crate::model::JobSpec;
use crate::progress::{ChannelProgress, JobEvent};

/// Runs copy jobs on a background thread, one at a time.
pub struct CopyEngine {
    config: EngineConfig,
    probe: Arc<dyn SpaceProbe>,
    active: Arc<AtomicBool>,
    current: Mutex<Option<CancelToken>>,
}

impl CopyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_probe(config, Arc::new(FilesystemProbe))
    }

    /// Create an engine that asks `probe` for destination free space.
    pub fn with_probe(config: EngineConfig, probe: Arc<dyn SpaceProbe>) -> Self {
        CopyEngine {
            config,
            probe,
            active: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Whether a job started on this engine is still running.
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start `spec` on a new worker thread.
    ///
    /// # Errors
    /// Returns `JobAlreadyRunning` if a previous job has not finished, or
    /// `WorkerSpawnFailed` if the thread could not be created.
    pub fn start_job(&self, spec: JobSpec) -> Result<JobHandle, EngineError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::JobAlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let (events_tx, events_rx) = unbounded();
        let (diag_tx, diag_rx) = unbounded();

        let config = self.config;
        let probe = Arc::clone(&self.probe);
        let worker_cancel = cancel.clone();

        // Visible to `cancel` before the worker can start copying
        if let Ok(mut current) = self.current.lock() {
            *current = Some(cancel.clone());
        }

        let worker = thread::Builder::new()
            .name(format!("copy-job-{}", id))
            .spawn(move || {
                let _guard = guard;
                log::info!("Job {} started", id);
                let progress = ChannelProgress::new(events_tx).with_diagnostics(diag_tx);
                let result = run_job(&spec, &config, probe.as_ref(), &worker_cancel, Some(&progress));
                match &result {
                    Ok(outcome) => log::info!("Job {} finished: {}", id, outcome.state()),
                    Err(e) => log::error!("Job {} failed: {}", id, e),
                }
                result
            })
            .map_err(|source| EngineError::WorkerSpawnFailed { source })?;

        Ok(JobHandle {
            id,
            events: events_rx,
            diagnostics: diag_rx,
            cancel,
            worker: Some(worker),
        })
    }

    /// Ask the running job, if any, to stop at the next file boundary.
    ///
    /// Safe to call at any time; after the job has ended it does nothing.
    pub fn cancel(&self) {
        if !self.is_busy() {
            return;
        }
        if let Ok(current) = self.current.lock() {
            if let Some(token) = current.as_ref() {
                token.cancel();
            }
        }
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Clears the engine's busy flag when the worker exits, even on panic.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A started job: its identity, event streams and cancellation handle.
pub struct JobHandle {
    id: Uuid,
    events: Receiver<JobEvent>,
    diagnostics: Receiver<FileFailure>,
    cancel: CancelToken,
    worker: Option<JoinHandle<Result<JobOutcome, EngineError>>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Progress events followed by exactly one terminal event.
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Per-file failures, in the order they happened.
    pub fn diagnostics(&self) -> &Receiver<FileFailure> {
        &self.diagnostics
    }

    /// Request cancellation at the next file boundary. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker exits and return how the job ended.
    ///
    /// # Errors
    /// Returns the fatal job error, or `WorkerPanicked` if the worker died.
    pub fn wait(mut self) -> Result<JobOutcome, EngineError> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| EngineError::WorkerPanicked)?,
            None => Err(EngineError::WorkerPanicked),
        }
    }
}
