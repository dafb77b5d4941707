//! Core data model for copy jobs.
//!
//! This module defines the main data structures for representing a copy job:
//! - JobSpec: the immutable request handed to the engine
//! - FileRecord / ScanResult: what the scanner found
//! - CopyOutcome: the worker's running counters
//! - OverwritePolicy, JobState, FileDecision: enums controlling behavior

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// A request to copy a set of sources into a destination root.
///
/// A JobSpec is consumed once by the engine and is never mutated after
/// submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Absolute paths of files and directories to copy, in selection order
    pub sources: Vec<PathBuf>,

    /// Absolute path of the directory receiving the copies
    pub destination_root: PathBuf,

    /// Number of leading source path segments to drop at the destination
    #[serde(default)]
    pub flatten_count: usize,

    /// How to handle files that already exist at the destination
    #[serde(default)]
    pub overwrite_policy: OverwritePolicy,
}

impl JobSpec {
    /// Create a job spec with no flattening and the `None` overwrite policy.
    pub fn new<I, P>(sources: I, destination_root: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        JobSpec {
            sources: sources.into_iter().map(Into::into).collect(),
            destination_root: destination_root.into(),
            flatten_count: 0,
            overwrite_policy: OverwritePolicy::None,
        }
    }

    pub fn with_flatten_count(mut self, flatten_count: usize) -> Self {
        self.flatten_count = flatten_count;
        self
    }

    pub fn with_overwrite_policy(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite_policy = policy;
        self
    }
}

/// Policy for handling files that already exist at the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Never overwrite; existing files are skipped
    #[default]
    None,
    /// Overwrite when the source is larger than the destination
    Larger,
    /// Overwrite when the source was modified after the destination
    Newer,
    /// Always overwrite
    Either,
}

impl OverwritePolicy {
    /// Decide whether an existing destination should be replaced by `source`.
    ///
    /// `dest_size` and `dest_modified` describe the file already in place.
    /// An unknown modification time compares as the Unix epoch.
    pub fn should_overwrite(
        &self,
        source: &FileRecord,
        dest_size: u64,
        dest_modified: Option<SystemTime>,
    ) -> bool {
        match self {
            OverwritePolicy::None => false,
            OverwritePolicy::Either => true,
            OverwritePolicy::Larger => source.size_bytes > dest_size,
            OverwritePolicy::Newer => {
                source.modified_at.unwrap_or(UNIX_EPOCH) > dest_modified.unwrap_or(UNIX_EPOCH)
            }
        }
    }
}

impl std::fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverwritePolicy::None => write!(f, "none"),
            OverwritePolicy::Larger => write!(f, "larger"),
            OverwritePolicy::Newer => write!(f, "newer"),
            OverwritePolicy::Either => write!(f, "either"),
        }
    }
}

impl FromStr for OverwritePolicy {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "skip" => Ok(OverwritePolicy::None),
            "larger" => Ok(OverwritePolicy::Larger),
            "newer" => Ok(OverwritePolicy::Newer),
            "either" | "always" => Ok(OverwritePolicy::Either),
            other => Err(crate::error::EngineError::InvalidPolicy {
                value: other.to_string(),
            }),
        }
    }
}

/// A single regular file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Normalized absolute path of the file
    pub absolute_path: PathBuf,

    /// Size in bytes (0 when the file could not be statted)
    pub size_bytes: u64,

    /// Last modification time, if it could be read
    pub modified_at: Option<SystemTime>,
}

impl FileRecord {
    /// Probe `path` for size and modification time.
    ///
    /// A failed probe degrades to size 0 and unknown age instead of an error.
    pub fn probe(path: &Path) -> Self {
        let (size_bytes, modified_at) = match std::fs::metadata(path) {
            Ok(metadata) => (metadata.len(), metadata.modified().ok()),
            Err(e) => {
                log::warn!("Unable to stat {}: {}", path.display(), e);
                (0, None)
            }
        };

        FileRecord {
            absolute_path: path.to_path_buf(),
            size_bytes,
            modified_at,
        }
    }
}

/// The deduplicated, sorted set of files a job will process.
///
/// Built only through [`ScanResult::from_records`], which keeps
/// `total_count` and `total_bytes` consistent with `files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    files: Vec<FileRecord>,
    total_count: usize,
    total_bytes: u64,
}

impl ScanResult {
    /// Sort records by path bytes, drop duplicate paths, and total them up.
    pub fn from_records(mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.absolute_path.as_os_str().cmp(b.absolute_path.as_os_str()));
        records.dedup_by(|a, b| a.absolute_path == b.absolute_path);

        let total_bytes = records.iter().map(|r| r.size_bytes).sum();
        ScanResult {
            total_count: records.len(),
            total_bytes,
            files: records,
        }
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Running counters owned by the copy worker.
///
/// Every counter only ever grows while a job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub files_copied: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub bytes_copied: u64,
}

impl CopyOutcome {
    /// Files that have reached a decision (copied, skipped, or failed).
    pub fn files_completed(&self) -> usize {
        self.files_copied + self.files_skipped + self.files_failed
    }

    /// Fold a single file decision into the counters.
    pub fn record(&mut self, decision: &FileDecision) {
        match decision {
            FileDecision::Copied { bytes } => {
                self.files_copied += 1;
                self.bytes_copied += bytes;
            }
            FileDecision::Skipped => self.files_skipped += 1,
            FileDecision::Failed => self.files_failed += 1,
        }
    }
}

/// The result of processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecision {
    /// Copied to the destination
    Copied { bytes: u64 },
    /// Left alone because of the overwrite policy
    Skipped,
    /// Attempted but the copy or directory creation failed
    Failed,
}

/// The state of a copy job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created, not yet started
    Idle,
    /// Enumerating sources
    Scanning,
    /// Comparing the scan total against free space
    CapacityCheck,
    /// Copying files one at a time
    Copying,
    /// Every file was processed
    Completed,
    /// Not enough free space at the destination
    InsufficientSpace,
    /// Stopped at a file boundary by request
    Cancelled,
    /// The job request itself was unusable
    FailedFatal,
}

impl JobState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed
                | JobState::InsufficientSpace
                | JobState::Cancelled
                | JobState::FailedFatal
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Idle => "Idle",
            JobState::Scanning => "Scanning",
            JobState::CapacityCheck => "CapacityCheck",
            JobState::Copying => "Copying",
            JobState::Completed => "Completed",
            JobState::InsufficientSpace => "InsufficientSpace",
            JobState::Cancelled => "Cancelled",
            JobState::FailedFatal => "FailedFatal",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord {
            absolute_path: PathBuf::from(path),
            size_bytes: size,
            modified_at: None,
        }
    }

    #[test]
    fn test_scan_result_dedups_and_sorts() {
        let scan = ScanResult::from_records(vec![
            record("/a/c/y.txt", 50),
            record("/a/b/x.txt", 100),
            record("/a/c/y.txt", 50),
        ]);

        let paths: Vec<_> = scan.files().iter().map(|r| r.absolute_path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/a/b/x.txt"), PathBuf::from("/a/c/y.txt")]);
        assert_eq!(scan.total_count(), 2);
        assert_eq!(scan.total_bytes(), 150);
    }

    #[test]
    fn test_scan_result_orders_by_path_bytes() {
        // '-' sorts before '/', so the sibling file comes first
        let scan = ScanResult::from_records(vec![record("/a/b/x", 1), record("/a/b-c", 1)]);
        assert_eq!(scan.files()[0].absolute_path, PathBuf::from("/a/b-c"));
    }

    #[test]
    fn test_unstattable_record_is_kept_with_zero_size() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let present = temp_dir.path().join("present.txt");
        std::fs::write(&present, b"12345").expect("Failed to write file");
        let vanished = temp_dir.path().join("vanished.txt");

        let lost = FileRecord::probe(&vanished);
        assert_eq!(lost.absolute_path, vanished);
        assert_eq!(lost.size_bytes, 0);
        assert_eq!(lost.modified_at, None);

        let scan = ScanResult::from_records(vec![FileRecord::probe(&present), lost]);
        assert_eq!(scan.total_count(), 2);
        assert_eq!(scan.total_bytes(), 5);
        assert!(scan.files().iter().any(|r| r.absolute_path == vanished));
    }

    #[test]
    fn test_policy_table_for_larger_older_source() {
        let now = SystemTime::now();
        let source = FileRecord {
            absolute_path: PathBuf::from("/src/file"),
            size_bytes: 200,
            modified_at: Some(now - Duration::from_secs(3600)),
        };

        assert!(!OverwritePolicy::None.should_overwrite(&source, 100, Some(now)));
        assert!(OverwritePolicy::Larger.should_overwrite(&source, 100, Some(now)));
        assert!(!OverwritePolicy::Newer.should_overwrite(&source, 100, Some(now)));
        assert!(OverwritePolicy::Either.should_overwrite(&source, 100, Some(now)));
    }

    #[test]
    fn test_newer_policy_with_unknown_times() {
        let source = record("/src/file", 1);
        assert!(!OverwritePolicy::Newer.should_overwrite(&source, 1, None));

        let dated = FileRecord {
            modified_at: Some(SystemTime::now()),
            ..record("/src/file", 1)
        };
        assert!(OverwritePolicy::Newer.should_overwrite(&dated, 1, None));
    }

    #[test]
    fn test_policy_parse_and_display() {
        for policy in [
            OverwritePolicy::None,
            OverwritePolicy::Larger,
            OverwritePolicy::Newer,
            OverwritePolicy::Either,
        ] {
            assert_eq!(policy.to_string().parse::<OverwritePolicy>().ok(), Some(policy));
        }
        assert_eq!("Skip".parse::<OverwritePolicy>().ok(), Some(OverwritePolicy::None));
        assert!("sometimes".parse::<OverwritePolicy>().is_err());
    }

    #[test]
    fn test_outcome_counts_decisions() {
        let mut outcome = CopyOutcome::default();
        outcome.record(&FileDecision::Copied { bytes: 10 });
        outcome.record(&FileDecision::Skipped);
        outcome.record(&FileDecision::Failed);

        assert_eq!(outcome.files_completed(), 3);
        assert_eq!(outcome.files_copied, 1);
        assert_eq!(outcome.bytes_copied, 10);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Copying.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::FailedFatal.is_terminal());
    }
}
