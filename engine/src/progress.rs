//! Progress reporting.
//!
//! This module defines the events a job emits and the ProgressCallback trait,
//! which decouples the engine from any specific controller or UI technology.
//!
//! A job emits zero or more [`JobEvent::Progress`] events followed by exactly
//! one terminal event. Per-file failures travel separately through
//! [`ProgressCallback::on_file_failed`] so they never interleave with that
//! sequence.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FileFailure;
use crate::model::{CopyOutcome, JobState};

/// Emitted after every file decision (copied, skipped, or failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// floor(100 * bytes_copied / total_bytes), clamped to 100
    pub percent_complete: u8,
    pub files_completed: usize,
    pub files_total: usize,
    pub files_skipped: usize,
    pub bytes_copied: u64,
    pub total_bytes: u64,
}

impl ProgressEvent {
    pub(crate) fn new(outcome: &CopyOutcome, files_total: usize, total_bytes: u64) -> Self {
        ProgressEvent {
            percent_complete: percent_complete(outcome.bytes_copied, total_bytes),
            files_completed: outcome.files_completed(),
            files_total,
            files_skipped: outcome.files_skipped,
            bytes_copied: outcome.bytes_copied,
            total_bytes,
        }
    }
}

/// Byte-weighted completion percentage.
///
/// An empty total reports 100; copies that outgrow the scanned total are
/// clamped to 100.
pub fn percent_complete(bytes_copied: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 100;
    }
    let percent = u128::from(bytes_copied) * 100 / u128::from(total_bytes);
    percent.min(100) as u8
}

/// Emitted once when every file has been processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub files_copied: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_bytes_copied: u64,
    /// Wall-clock time since copying began
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CompletionEvent {
    /// Average throughput in bytes per second (0 for an instantaneous job).
    pub fn transfer_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes_copied as f64 / secs
        } else {
            0.0
        }
    }
}

/// Emitted when the destination cannot hold the scanned total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientSpaceEvent {
    pub required_bytes: u64,
    pub available_bytes: u64,
}

impl InsufficientSpaceEvent {
    /// Additional bytes that would have to be freed.
    pub fn shortfall(&self) -> u64 {
        self.required_bytes.saturating_sub(self.available_bytes)
    }
}

/// Everything a job reports on its event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress(ProgressEvent),
    Completed(CompletionEvent),
    InsufficientSpace(InsufficientSpaceEvent),
    Cancelled {
        files_completed: usize,
        files_copied: usize,
        bytes_copied: u64,
    },
    FailedFatal {
        message: String,
    },
}

impl JobEvent {
    /// Returns true for the single event that ends a job's stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }

    /// The terminal job state this event reports, if any.
    pub fn terminal_state(&self) -> Option<JobState> {
        match self {
            JobEvent::Progress(_) => None,
            JobEvent::Completed(_) => Some(JobState::Completed),
            JobEvent::InsufficientSpace(_) => Some(JobState::InsufficientSpace),
            JobEvent::Cancelled { .. } => Some(JobState::Cancelled),
            JobEvent::FailedFatal { .. } => Some(JobState::FailedFatal),
        }
    }
}

/// Trait for receiving events from a running job.
///
/// All methods are called synchronously from the job's worker, so
/// implementations must not block.
pub trait ProgressCallback: Send + Sync {
    /// Called for every progress event and for the terminal event.
    fn on_event(&self, event: &JobEvent);

    /// Called when the job moves to a new state.
    fn on_state_changed(&self, _state: JobState) {}

    /// Called when a single file could not be copied.
    fn on_file_failed(&self, _failure: &FileFailure) {}
}

/// A ProgressCallback that forwards everything over crossbeam channels.
///
/// Sends never block on unbounded channels. A receiver that has gone away is
/// ignored so the copy loop keeps running.
pub struct ChannelProgress {
    events: Sender<JobEvent>,
    diagnostics: Option<Sender<FileFailure>>,
}

impl ChannelProgress {
    pub fn new(events: Sender<JobEvent>) -> Self {
        ChannelProgress {
            events,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Sender<FileFailure>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_event(&self, event: &JobEvent) {
        let _ = self.events.send(event.clone());
    }

    fn on_file_failed(&self, failure: &FileFailure) {
        if let Some(diagnostics) = &self.diagnostics {
            let _ = diagnostics.send(failure.clone());
        }
    }
}
