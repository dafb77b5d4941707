//! # Mover Engine - Bulk File Copy Library
//!
//! A headless, UI-agnostic engine that copies a selection of files and
//! directory trees into a destination, one file at a time, on a background
//! worker.
//!
//! ## Overview
//!
//! The engine features:
//! - Recursive enumeration of mixed file/directory selections, deduplicated and sorted
//! - Flattened destination layouts (drop the leading N path segments)
//! - Overwrite policies (none, larger, newer, either)
//! - A free-space check before anything is written
//! - Byte-weighted progress events over a channel, with cooperative cancellation
//!
//! ## Basic Usage
//!
//! ```no_run
//! use mover_engine::{CopyEngine, JobEvent, JobSpec, OverwritePolicy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CopyEngine::default();
//! let spec = JobSpec::new(["/music/incoming/album", "/music/single.mp3"], "/mnt/player")
//!     .with_flatten_count(2)
//!     .with_overwrite_policy(OverwritePolicy::Newer);
//!
//! let handle = engine.start_job(spec)?;
//! for event in handle.events() {
//!     match event {
//!         JobEvent::Progress(p) => println!("{}% ({}/{})", p.percent_complete, p.files_completed, p.files_total),
//!         other => println!("finished: {:?}", other),
//!     }
//! }
//! handle.wait()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (JobSpec, FileRecord, ScanResult, enums)
//! - **error**: Error types and per-file failure records
//! - **config**: Engine tunables
//! - **flatten**: Destination path computation
//! - **scan**: Source enumeration
//! - **capacity**: Free-space queries
//! - **fs_ops**: Low-level filesystem operations
//! - **progress**: Events and the progress callback trait
//! - **job**: Synchronous job state machine
//! - **worker**: Background engine and job handles

pub mod model;
pub mod error;
pub mod config;
pub mod flatten;
pub mod scan;
pub mod capacity;
pub mod fs_ops;
pub mod progress;
pub mod job;
pub mod worker;

// Re-export main types and functions
pub use model::{
    CopyOutcome, FileDecision, FileRecord, JobSpec, JobState, OverwritePolicy, ScanResult,
};
pub use error::{EngineError, FailureKind, FileFailure};
pub use config::EngineConfig;
pub use flatten::{compute_destination, preview_destinations, split_segments};
pub use scan::scan;
pub use capacity::{free_space, FilesystemProbe, SpaceProbe};
pub use progress::{
    ChannelProgress, CompletionEvent, InsufficientSpaceEvent, JobEvent, ProgressCallback,
    ProgressEvent,
};
pub use job::{plan_job, run_job, validate_job, CancelToken, JobOutcome};
pub use worker::{CopyEngine, JobHandle};
