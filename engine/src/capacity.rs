//! Destination free-space queries.

use std::io;
use std::path::Path;
use sysinfo::Disks;

use crate::error::EngineError;

/// Bytes available on the disk whose mount point is the longest prefix of `path`.
pub fn free_space(path: &Path) -> Result<u64, EngineError> {
    let unavailable = |source: io::Error| EngineError::FilesystemUnavailable {
        path: path.to_path_buf(),
        source,
    };
    std::fs::metadata(path).map_err(unavailable)?;
    let resolved = std::path::absolute(path).map_err(unavailable)?;

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        .ok_or_else(|| {
            unavailable(io::Error::new(
                io::ErrorKind::NotFound,
                "no mounted disk contains this path",
            ))
        })
}

/// Source of free-space figures for the capacity check.
///
/// The engine uses [`FilesystemProbe`]; tests substitute fixed figures.
pub trait SpaceProbe: Send + Sync {
    fn free_space(&self, path: &Path) -> Result<u64, EngineError>;
}

/// Queries the real filesystem through [`free_space`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemProbe;

impl SpaceProbe for FilesystemProbe {
    fn free_space(&self, path: &Path) -> Result<u64, EngineError> {
        free_space(path)
    }
}

/// Free space at `path`, or 0 when it cannot be determined.
pub fn free_space_or_zero(probe: &dyn SpaceProbe, path: &Path) -> u64 {
    match probe.free_space(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("{}; assuming no space is available", e);
            0
        }
    }
}
