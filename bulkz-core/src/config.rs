use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{BulkzError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_MIN_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LEVEL: i32 = 3;
pub const DEFAULT_ERROR_LOG: &str = "compression_errors.log";

/// Already-compressed or media formats that rarely shrink further.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".zst", ".gz", ".zip", ".rar", ".7z", ".tar", ".bz2", ".xz", ".jpg", ".jpeg", ".png", ".gif",
    ".webp", ".mp4", ".mp3", ".mkv",
];

/// Settings for one compression run. Built once, then shared read-only
/// (behind an `Arc`) by every worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Bytes per streaming read/write. Bounds per-file memory.
    pub chunk_size: usize,
    /// Files smaller than this are ignored by discovery.
    pub min_file_size: u64,
    pub workers: usize,
    /// Codec-specific; clamped into the codec's accepted range.
    pub level: i32,
    /// Remove the source only after a confirmed successful compression.
    pub delete_original: bool,
    pub verify_integrity: bool,
    /// When set, only these extensions are considered.
    pub include_extensions: Option<BTreeSet<String>>,
    /// Always wins over `include_extensions`.
    pub exclude_extensions: BTreeSet<String>,
    #[serde(serialize_with = "lossy_opt_path")]
    pub output_dir: Option<PathBuf>,
    #[serde(serialize_with = "lossy_path")]
    pub error_log: PathBuf,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            workers: default_workers(),
            level: DEFAULT_LEVEL,
            delete_original: false,
            verify_integrity: true,
            include_extensions: None,
            exclude_extensions: normalize_extensions(DEFAULT_EXCLUDED_EXTENSIONS.iter().copied()),
            output_dir: None,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
        }
    }
}

impl CompressionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BulkzError::Config("chunk size must be greater than 0".into()));
        }
        if self.workers == 0 {
            return Err(BulkzError::Config("worker count must be greater than 0".into()));
        }
        Ok(())
    }

    /// Replace the include list; `None` accepts every extension.
    pub fn with_include_extensions<I, S>(mut self, exts: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_extensions = exts.map(normalize_extensions);
        self
    }

    pub fn with_exclude_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_extensions = normalize_extensions(exts);
        self
    }

    /// Extension filter used by discovery. Exclusion is checked last.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        if let Some(include) = &self.include_extensions {
            if !include.contains(&ext) {
                return false;
            }
        }
        !self.exclude_extensions.contains(&ext)
    }
}

fn lossy_path<S: Serializer>(path: &Path, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&path.to_string_lossy())
}

fn lossy_opt_path<S: Serializer>(
    path: &Option<PathBuf>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match path {
        Some(p) => s.serialize_some(&p.to_string_lossy()),
        None => s.serialize_none(),
    }
}

pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Lowercases and prefixes a dot: `"TXT"` and `".txt"` both become `".txt"`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

pub fn normalize_extensions<I, S>(exts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .map(|e| normalize_extension(e.as_ref()))
        .filter(|e| !e.is_empty())
        .collect()
}

/// Final extension of `path` in normalized form, or `""` when it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CompressionConfig::default();
        assert_eq!(cfg.chunk_size, 65536);
        assert_eq!(cfg.min_file_size, 10 * 1024 * 1024);
        assert_eq!(cfg.level, 3);
        assert!(cfg.verify_integrity);
        assert!(!cfg.delete_original);
        assert!(cfg.workers >= 1);
        assert!(cfg.exclude_extensions.contains(".zst"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let cfg = CompressionConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BulkzError::Config(_))));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = CompressionConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BulkzError::Config(_))));
    }

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(normalize_extension("TXT"), ".txt");
        assert_eq!(normalize_extension(".Log"), ".log");
        assert_eq!(normalize_extension("  csv "), ".csv");
        assert_eq!(extension_of(Path::new("a/b/DATA.CSV")), ".csv");
        assert_eq!(extension_of(Path::new("a/b/noext")), "");
    }

    #[test]
    fn exclude_wins_over_include() {
        let cfg = CompressionConfig::default()
            .with_include_extensions(Some(["log", "gz"]))
            .with_exclude_extensions(["gz"]);
        assert!(cfg.accepts_extension(Path::new("x.log")));
        assert!(cfg.accepts_extension(Path::new("x.LOG")));
        assert!(!cfg.accepts_extension(Path::new("x.gz")));
        assert!(!cfg.accepts_extension(Path::new("x.txt")));
    }

    #[test]
    fn include_list_rejects_files_without_extension() {
        let cfg = CompressionConfig::default().with_include_extensions(Some(["txt"]));
        assert!(!cfg.accepts_extension(Path::new("Makefile")));
        let open = CompressionConfig::default();
        assert!(open.accepts_extension(Path::new("Makefile")));
    }
}
