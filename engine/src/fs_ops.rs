//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Copying files with metadata preservation
//! - Creating destination directories recursively
//! - Inspecting an existing destination file

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::error::EngineError;

/// Copy a file from source to destination with metadata preservation.
///
/// The destination's parent directory must already exist. Permissions and
/// access/modification times are carried over where the platform allows;
/// failing to set them does not fail the copy.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_metadata = src_file.metadata().map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    let mtime = filetime::FileTime::from_last_modification_time(&src_metadata);
    let atime = filetime::FileTime::from_last_access_time(&src_metadata);
    if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
        log::debug!("Could not copy timestamps to {}: {}", dst.display(), e);
    }

    if let Err(e) = fs::set_permissions(dst, src_metadata.permissions()) {
        log::debug!("Could not copy permissions to {}: {}", dst.display(), e);
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if the parent exists but is not a
/// directory, or cannot be created.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        }),
    }
}

/// Size and modification time of an existing destination, or `None` if
/// nothing usable is there.
///
/// Any stat failure counts as "absent"; the copy attempt that follows
/// surfaces the real problem.
pub fn existing_destination(path: &Path) -> Option<(u64, Option<SystemTime>)> {
    match fs::metadata(path) {
        Ok(metadata) => Some((metadata.len(), metadata.modified().ok())),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                log::debug!("Unable to stat destination {}: {}", path.display(), e);
            }
            None
        }
    }
}
