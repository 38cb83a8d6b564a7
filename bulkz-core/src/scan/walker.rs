use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::CompressionConfig;
use crate::error::{BulkzError, Result};
use crate::events::EventSink;

/// A file that passed discovery filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
}

/// Walk `root` recursively and return the regular files that pass the size
/// and extension filters, largest first (ties broken by path).
///
/// Entries that cannot be read are reported to `events` and skipped.
/// Symlinks are not followed.
pub fn find_candidates(
    root: &Path,
    config: &CompressionConfig,
    events: &dyn EventSink,
) -> Result<Vec<Candidate>> {
    if !root.exists() {
        return Err(BulkzError::DirectoryNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(BulkzError::NotADirectory(root.to_path_buf()));
    }

    let mut found = Vec::new();
    for e in WalkDir::new(root).follow_links(false) {
        let e = match e {
            Ok(e) => e,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                events.entry_skipped(&path, &err.to_string());
                continue;
            }
        };
        if !e.file_type().is_file() {
            continue;
        }
        let size = match e.metadata() {
            Ok(md) => md.len(),
            Err(err) => {
                events.entry_skipped(e.path(), &err.to_string());
                continue;
            }
        };
        if size < config.min_file_size {
            continue;
        }
        if !config.accepts_extension(e.path()) {
            continue;
        }
        found.push(Candidate {
            path: e.into_path(),
            size,
        });
    }

    // Biggest files first so the pool does not end on one long straggler.
    found.sort_by(|a, b| (Reverse(a.size), &a.path).cmp(&(Reverse(b.size), &b.path)));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use std::fs;

    fn cfg(min: u64) -> CompressionConfig {
        CompressionConfig {
            min_file_size: min,
            ..Default::default()
        }
    }

    fn write(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![b'a'; len]).unwrap();
    }

    #[test]
    fn filters_by_size_and_sorts_largest_first() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("small.txt"), 10);
        write(&dir.path().join("mid.txt"), 500);
        write(&dir.path().join("nested/deep/big.txt"), 2000);
        write(&dir.path().join("nested/edge.txt"), 100);

        let found = find_candidates(dir.path(), &cfg(100), &NullSink).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["big.txt", "mid.txt", "edge.txt"]);
        assert_eq!(found[0].size, 2000);
    }

    #[test]
    fn default_excludes_skip_compressed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.log"), 10);
        write(&dir.path().join("a.log.zst"), 10);
        write(&dir.path().join("photo.JPG"), 10);

        let found = find_candidates(dir.path(), &cfg(0), &NullSink).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("a.log"));
    }

    #[test]
    fn include_and_exclude_lists() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.csv"), 10);
        write(&dir.path().join("b.CSV"), 10);
        write(&dir.path().join("c.log"), 10);
        write(&dir.path().join("d.txt"), 10);

        let config = cfg(0)
            .with_include_extensions(Some(["csv", ".log"]))
            .with_exclude_extensions([".log"]);
        let found = find_candidates(dir.path(), &config, &NullSink).unwrap();
        let mut names: Vec<_> = found
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.CSV"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_candidates(&dir.path().join("nope"), &cfg(0), &NullSink).unwrap_err();
        assert!(matches!(err, BulkzError::DirectoryNotFound(_)));
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("f.txt");
        write(&f, 1);
        let err = find_candidates(&f, &cfg(0), &NullSink).unwrap_err();
        assert!(matches!(err, BulkzError::NotADirectory(_)));
    }
}
