//! Job orchestration module.
//!
//! This module runs a single job synchronously on the calling thread:
//! - Validating the job request
//! - Planning a job (scanning sources and resolving destinations)
//! - Running a job through Scanning, CapacityCheck and Copying
//!
//! [`crate::worker::CopyEngine`] runs the same function on a dedicated thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::capacity::{free_space_or_zero, SpaceProbe};
use crate::config::EngineConfig;
use crate::error::{EngineError, FileFailure};
use crate::flatten::compute_destination;
use crate::fs_ops;
use crate::model::{CopyOutcome, FileDecision, FileRecord, JobSpec, JobState, OverwritePolicy};
use crate::progress::{
    CompletionEvent, InsufficientSpaceEvent, JobEvent, ProgressCallback, ProgressEvent,
};
use crate::scan::scan;

/// Shared cancellation flag, polled by the worker between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a job ended, when it did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(CompletionEvent),
    InsufficientSpace(InsufficientSpaceEvent),
    Cancelled(CopyOutcome),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) => JobState::Completed,
            JobOutcome::InsufficientSpace(_) => JobState::InsufficientSpace,
            JobOutcome::Cancelled(_) => JobState::Cancelled,
        }
    }
}

/// Check that a job request is structurally usable.
///
/// # Errors
/// Returns `InvalidJob` when the destination root is empty, relative, missing
/// or not a directory, or when a source path is empty or relative.
pub fn validate_job(spec: &JobSpec) -> Result<(), EngineError> {
    let root = &spec.destination_root;
    if root.as_os_str().is_empty() {
        return Err(EngineError::invalid_job("destination root is empty"));
    }
    if !root.is_absolute() {
        return Err(EngineError::invalid_job(format!(
            "destination root must be absolute: {}",
            root.display()
        )));
    }
    match std::fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(EngineError::invalid_job(format!(
                "destination root is not a directory: {}",
                root.display()
            )))
        }
        Err(e) => {
            return Err(EngineError::invalid_job(format!(
                "destination root is unreadable: {} ({})",
                root.display(),
                e
            )))
        }
    }

    for source in &spec.sources {
        if source.as_os_str().is_empty() {
            return Err(EngineError::invalid_job("source path is empty"));
        }
        if !source.is_absolute() {
            return Err(EngineError::invalid_job(format!(
                "source path must be absolute: {}",
                source.display()
            )));
        }
    }
    Ok(())
}

/// Scan a job's sources and resolve where each file would land.
///
/// Nothing is copied; this is the dry-run view of a job.
pub fn plan_job(spec: &JobSpec) -> Result<Vec<(FileRecord, PathBuf)>, EngineError> {
    validate_job(spec)?;

    let plan = scan(&spec.sources)
        .files()
        .iter()
        .map(|record| {
            let destination = compute_destination(
                &record.absolute_path,
                &spec.destination_root,
                spec.flatten_count,
            );
            (record.clone(), destination)
        })
        .collect();
    Ok(plan)
}

/// Determine whether to copy a file given what is already at `destination`.
fn should_copy_file(record: &FileRecord, destination: &Path, policy: OverwritePolicy) -> bool {
    match fs_ops::existing_destination(destination) {
        None => true,
        Some((dest_size, dest_modified)) => {
            policy.should_overwrite(record, dest_size, dest_modified)
        }
    }
}

/// Decide on and, if warranted, copy a single file.
fn process_file(
    record: &FileRecord,
    destination: &Path,
    policy: OverwritePolicy,
    progress: Option<&dyn ProgressCallback>,
) -> FileDecision {
    if destination == record.absolute_path.as_path() {
        log::warn!(
            "Skipping {}: destination is the source itself",
            destination.display()
        );
        return FileDecision::Skipped;
    }

    if !should_copy_file(record, destination, policy) {
        log::debug!("Skipped {} (policy {})", record.absolute_path.display(), policy);
        return FileDecision::Skipped;
    }

    let result = fs_ops::ensure_parent_dir_exists(destination)
        .and_then(|()| fs_ops::copy_file_with_metadata(&record.absolute_path, destination));

    match result {
        Ok(bytes) => {
            log::debug!(
                "Copied {} -> {} ({} bytes)",
                record.absolute_path.display(),
                destination.display(),
                bytes
            );
            FileDecision::Copied { bytes }
        }
        Err(e) => {
            log::warn!("{}", e);
            let failure =
                FileFailure::new(record.absolute_path.clone(), destination.to_path_buf(), &e);
            if let Some(callback) = progress {
                callback.on_file_failed(&failure);
            }
            FileDecision::Failed
        }
    }
}

fn enter(state: JobState, progress: Option<&dyn ProgressCallback>) {
    log::debug!("Job state -> {}", state);
    if let Some(callback) = progress {
        callback.on_state_changed(state);
    }
}

fn emit(event: JobEvent, progress: Option<&dyn ProgressCallback>) {
    if let Some(callback) = progress {
        callback.on_event(&event);
    }
}

/// Run a job to completion on the calling thread.
///
/// Moves through Scanning, CapacityCheck and Copying, invoking `progress` after
/// every file and exactly once with a terminal event. Individual file errors
/// are reported through `on_file_failed` and do NOT stop the job.
///
/// # Errors
/// Returns EngineError only when the job request is malformed. A
/// `FailedFatal` event has already been emitted in that case.
pub fn run_job(
    spec: &JobSpec,
    config: &EngineConfig,
    probe: &dyn SpaceProbe,
    cancel: &CancelToken,
    progress: Option<&dyn ProgressCallback>,
) -> Result<JobOutcome, EngineError> {
    if let Err(e) = validate_job(spec) {
        log::error!("Rejecting job: {}", e);
        enter(JobState::FailedFatal, progress);
        emit(
            JobEvent::FailedFatal {
                message: e.to_string(),
            },
            progress,
        );
        return Err(e);
    }

    log::info!(
        "Starting job: {} source entries -> {} (flatten {}, overwrite {})",
        spec.sources.len(),
        spec.destination_root.display(),
        spec.flatten_count,
        spec.overwrite_policy
    );

    enter(JobState::Scanning, progress);
    let scanned = scan(&spec.sources);
    let files_total = scanned.total_count();
    let total_bytes = scanned.total_bytes();

    enter(JobState::CapacityCheck, progress);
    let available_bytes = free_space_or_zero(probe, &spec.destination_root);
    if !config.has_room_for(total_bytes, available_bytes) {
        log::info!(
            "Not enough space at {}: need {} bytes, {} available",
            spec.destination_root.display(),
            total_bytes,
            available_bytes
        );
        let event = InsufficientSpaceEvent {
            required_bytes: total_bytes,
            available_bytes,
        };
        enter(JobState::InsufficientSpace, progress);
        emit(JobEvent::InsufficientSpace(event), progress);
        return Ok(JobOutcome::InsufficientSpace(event));
    }

    enter(JobState::Copying, progress);
    let started_at = Utc::now();
    let start = Instant::now();
    let mut outcome = CopyOutcome::default();

    if scanned.is_empty() {
        // An empty selection is already done
        emit(
            JobEvent::Progress(ProgressEvent::new(&outcome, 0, 0)),
            progress,
        );
    }

    for record in scanned.files() {
        if cancel.is_cancelled() {
            log::info!(
                "Job cancelled after {} of {} files",
                outcome.files_completed(),
                files_total
            );
            enter(JobState::Cancelled, progress);
            emit(
                JobEvent::Cancelled {
                    files_completed: outcome.files_completed(),
                    files_copied: outcome.files_copied,
                    bytes_copied: outcome.bytes_copied,
                },
                progress,
            );
            return Ok(JobOutcome::Cancelled(outcome));
        }

        let destination = compute_destination(
            &record.absolute_path,
            &spec.destination_root,
            spec.flatten_count,
        );
        let decision = process_file(record, &destination, spec.overwrite_policy, progress);
        outcome.record(&decision);

        emit(
            JobEvent::Progress(ProgressEvent::new(&outcome, files_total, total_bytes)),
            progress,
        );
    }

    let completion = CompletionEvent {
        files_copied: outcome.files_copied,
        files_skipped: outcome.files_skipped,
        files_failed: outcome.files_failed,
        total_bytes_copied: outcome.bytes_copied,
        elapsed: start.elapsed(),
        started_at,
        finished_at: Utc::now(),
    };
    log::info!(
        "Job complete: {} copied, {} skipped, {} failed, {} bytes in {:?}",
        completion.files_copied,
        completion.files_skipped,
        completion.files_failed,
        completion.total_bytes_copied,
        completion.elapsed
    );
    enter(JobState::Completed, progress);
    emit(JobEvent::Completed(completion.clone()), progress);
    Ok(JobOutcome::Completed(completion))
}
