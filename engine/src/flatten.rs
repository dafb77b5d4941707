//! Destination path computation.
//!
//! A source path is split into its segments (drive prefix and root removed),
//! the leading `flatten_count` segments are dropped, and the remainder is
//! joined under the destination root. No filesystem access happens here.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::model::JobSpec;

/// Split a path into its named segments.
///
/// Drive/volume prefixes, the root separator and `.` components are left
/// out. Repeated and trailing separators never yield empty segments.
pub fn split_segments(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => None,
            Component::ParentDir => Some(OsString::from("..")),
            Component::Normal(segment) => Some(segment.to_os_string()),
        })
        .collect()
}

/// Compute where `source` lands under `destination_root`.
///
/// With `flatten_count == 0` the whole segment list is kept. Otherwise the
/// first `flatten_count` segments are dropped; when that would leave nothing,
/// only the final segment (the file name) is used.
pub fn compute_destination(source: &Path, destination_root: &Path, flatten_count: usize) -> PathBuf {
    let segments = split_segments(source);

    let kept: &[OsString] = if flatten_count == 0 || segments.len() > flatten_count {
        &segments[flatten_count.min(segments.len())..]
    } else {
        // Trimming exceeds the depth; keep just the file name
        &segments[segments.len().saturating_sub(1)..]
    };

    let mut destination = destination_root.to_path_buf();
    destination.extend(kept);
    normalize(&destination)
}

/// Map every source entry of `spec` to its flattened destination.
pub fn preview_destinations(spec: &JobSpec) -> Vec<(PathBuf, PathBuf)> {
    spec.sources
        .iter()
        .map(|source| {
            let destination =
                compute_destination(source, &spec.destination_root, spec.flatten_count);
            (source.clone(), destination)
        })
        .collect()
}

/// Lexically normalize a path: resolve `.` and `..` without touching the disk.
///
/// Relative paths are anchored at the current directory first.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let anchored = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in anchored.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never climb above the root
                if normalized.file_name().is_some() {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_split_drops_root_and_empty_segments() {
        let segments = split_segments(Path::new("//a///b/./c.txt"));
        assert_eq!(segments, vec!["a", "b", "c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_split_ignores_trailing_separator() {
        assert_eq!(split_segments(Path::new("/a/b/")), vec!["a", "b"]);
    }

    #[cfg(windows)]
    #[test]
    fn test_split_strips_drive_prefix() {
        let segments = split_segments(Path::new(r"C:\music\album\track.mp3"));
        assert_eq!(segments, vec!["music", "album", "track.mp3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_flatten_zero_keeps_full_structure() {
        let dest = compute_destination(Path::new("/a/b/x.txt"), Path::new("/out"), 0);
        assert_eq!(dest, PathBuf::from("/out/a/b/x.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_flatten_drops_leading_segments() {
        let source = Path::new("/a/b/c/x.txt");
        assert_eq!(
            compute_destination(source, Path::new("/out"), 1),
            PathBuf::from("/out/b/c/x.txt")
        );
        assert_eq!(
            compute_destination(source, Path::new("/out"), 3),
            PathBuf::from("/out/x.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_flatten_beyond_depth_keeps_file_name() {
        let source = Path::new("/a/b/x.txt");
        for count in [3, 4, 100] {
            assert_eq!(
                compute_destination(source, Path::new("/out"), count),
                PathBuf::from("/out/x.txt"),
                "flatten_count = {}",
                count
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_root_source_maps_to_destination_root() {
        assert_eq!(
            compute_destination(Path::new("/"), Path::new("/out"), 2),
            PathBuf::from("/out")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_destination_is_normalized() {
        let dest = compute_destination(Path::new("/a/../b/x.txt"), Path::new("/out/./dir/"), 0);
        assert_eq!(dest, PathBuf::from("/out/dir/b/x.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_preview_maps_each_source() {
        let spec = JobSpec::new(["/a/b/x.txt", "/a/c"], "/out").with_flatten_count(1);
        let preview = preview_destinations(&spec);
        assert_eq!(
            preview,
            vec![
                (PathBuf::from("/a/b/x.txt"), PathBuf::from("/out/b/x.txt")),
                (PathBuf::from("/a/c"), PathBuf::from("/out/c")),
            ]
        );
    }
}
