//! Source enumeration.
//!
//! Expands a job's source entries into the flat, deduplicated, sorted list of
//! regular files the copy loop will process.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::flatten::normalize;
use crate::model::{FileRecord, ScanResult};

/// Scan every source entry and build the job's [`ScanResult`].
///
/// Entries that are missing or unreadable are logged and left out; the scan
/// itself never fails.
pub fn scan<P: AsRef<Path>>(sources: &[P]) -> ScanResult {
    let mut records = Vec::new();

    for source in sources {
        let source = normalize(source.as_ref());
        if let Err(e) = collect_entry(&source, &mut records) {
            log::warn!("Skipping source entry: {}", e);
        }
    }

    let result = ScanResult::from_records(records);
    log::debug!(
        "Scan found {} files ({} bytes) across {} source entries",
        result.total_count(),
        result.total_bytes(),
        sources.len()
    );
    result
}

/// Record a single source entry: the file itself, or every file below a directory.
fn collect_entry(source: &Path, records: &mut Vec<FileRecord>) -> Result<(), EngineError> {
    let metadata = fs::metadata(source).map_err(|e| EngineError::EnumerationFailed {
        path: source.to_path_buf(),
        source: e,
    })?;

    if metadata.is_file() {
        records.push(FileRecord::probe(source));
    } else if metadata.is_dir() {
        walk_directory(source, records);
    } else {
        log::debug!("Ignoring special file {}", source.display());
    }
    Ok(())
}

/// Walk a directory tree without following directory symlinks.
///
/// Symlinks met during the walk are dereferenced once: a link to a regular
/// file is recorded, anything else is ignored.
fn walk_directory(root: &Path, records: &mut Vec<FileRecord>) {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).display().to_string();
                log::warn!("Failed to enumerate {}: {}", path, e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_file() {
            records.push(FileRecord::probe(entry.path()));
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => records.push(FileRecord::probe(entry.path())),
                Ok(_) => log::debug!("Not following symlink {}", entry.path().display()),
                Err(e) => log::warn!("Dangling symlink {}: {}", entry.path().display(), e),
            }
        }
    }
}
