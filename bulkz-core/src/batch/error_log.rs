use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::report::now_rfc3339;

/// Append-only log of per-file failures, one line per entry:
/// `[<rfc3339>] <input>: <message>`.
#[derive(Clone, Debug)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens in append mode and writes the whole line with a single call, so
    /// entries from separate runs never interleave mid-line.
    pub fn append(&self, input: &Path, message: &str) -> std::io::Result<()> {
        let line = format_line(&now_rfc3339(), input, message);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(line.as_bytes())
    }
}

fn format_line(timestamp: &str, input: &Path, message: &str) -> String {
    // Keep one entry per line even if an OS message carries newlines.
    let message = message.replace(['\r', '\n'], " ");
    format!("[{timestamp}] {}: {message}\n", input.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("errors.log"));
        log.append(Path::new("/data/a.csv"), "Integrity verification failed")
            .unwrap();
        log.append(Path::new("/data/b.csv"), "disk full").unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] /data/a.csv: Integrity verification failed"));
        assert!(lines[1].ends_with("] /data/b.csv: disk full"));
    }

    #[test]
    fn newlines_in_messages_are_flattened() {
        let line = format_line("2024-01-01T00:00:00Z", Path::new("x"), "one\ntwo");
        assert_eq!(line, "[2024-01-01T00:00:00Z] x: one two\n");
    }

    #[test]
    fn missing_parent_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("no/such/dir/errors.log"));
        assert!(log.append(Path::new("x"), "y").is_err());
    }
}
