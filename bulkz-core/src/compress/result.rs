use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::hash::Checksum;

/// Per-file pipeline stage, used to say where a failure happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sizing,
    Checksumming,
    Compressing,
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sizing => "sizing",
            Self::Checksumming => "checksumming",
            Self::Compressing => "compressing",
            Self::Verifying => "verifying",
        })
    }
}

/// Why a single file did not produce trusted output.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FileFailure {
    #[error("{message} (while {stage})")]
    Io { stage: Stage, message: String },

    /// Decoded output did not hash to the original digest. `actual` is `None`
    /// when the output could not be decoded at all.
    #[error("Integrity verification failed")]
    Verification {
        expected: Checksum,
        actual: Option<Checksum>,
    },

    #[error("Interrupted")]
    Interrupted,

    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    #[error("Output path collides with {}", .0.display())]
    OutputCollision(PathBuf),
}

impl FileFailure {
    pub fn io(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Io {
            stage,
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compressed {
    pub compressed_size: u64,
    /// True only when a round-trip check ran and matched.
    pub verified: bool,
}

/// Outcome of one compression attempt. Exactly one exists per work item and
/// it is never modified after being returned.
#[derive(Clone, Debug)]
pub struct CompressionResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub original_size: u64,
    pub elapsed: Duration,
    /// Input blocks streamed through the encoder.
    pub chunks: u64,
    pub original_checksum: Option<Checksum>,
    pub outcome: Result<Compressed, FileFailure>,
}

impl CompressionResult {
    /// Result for a work item that never reached the compressor.
    pub fn not_run(input: &Path, output: &Path, failure: FileFailure) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            original_size: 0,
            elapsed: Duration::ZERO,
            chunks: 0,
            original_checksum: None,
            outcome: Err(failure),
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure(&self) -> Option<&FileFailure> {
        self.outcome.as_ref().err()
    }

    /// Zero for failed attempts; their output is never trusted.
    pub fn compressed_size(&self) -> u64 {
        self.outcome
            .as_ref()
            .map(|c| c.compressed_size)
            .unwrap_or(0)
    }

    pub fn checksum_verified(&self) -> bool {
        self.outcome.as_ref().map(|c| c.verified).unwrap_or(false)
    }

    /// Space saved as a percentage of the original size.
    pub fn compression_ratio(&self) -> f64 {
        if !self.success() {
            return 0.0;
        }
        ratio_percent(self.original_size, self.compressed_size())
    }

    /// MiB of input per second.
    pub fn throughput_mbps(&self) -> f64 {
        mib_per_sec(self.original_size, self.elapsed.as_secs_f64())
    }

    pub fn error_message(&self) -> Option<String> {
        self.failure().map(ToString::to_string)
    }
}

pub(crate) fn ratio_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

pub(crate) fn mib_per_sec(bytes: u64, secs: f64) -> f64 {
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / 1024.0 / 1024.0 / secs
}

/// Flat wire form of a result, as written to JSON reports. Paths are lossy
/// so one non-UTF-8 name cannot fail a whole report.
#[derive(Serialize)]
struct ResultRecord<'a> {
    input_file: Cow<'a, str>,
    output_file: Cow<'a, str>,
    success: bool,
    original_size: u64,
    compressed_size: u64,
    compression_ratio: f64,
    time_seconds: f64,
    throughput_mbps: f64,
    chunks: u64,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_stage: Option<Stage>,
    checksum_original: Option<Checksum>,
    checksum_verified: bool,
}

impl Serialize for CompressionResult {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let failed_stage = match self.failure() {
            Some(FileFailure::Io { stage, .. }) => Some(*stage),
            Some(FileFailure::Verification { .. }) => Some(Stage::Verifying),
            _ => None,
        };
        ResultRecord {
            input_file: self.input_path.to_string_lossy(),
            output_file: self.output_path.to_string_lossy(),
            success: self.success(),
            original_size: self.original_size,
            compressed_size: self.compressed_size(),
            compression_ratio: self.compression_ratio(),
            time_seconds: self.elapsed.as_secs_f64(),
            throughput_mbps: self.throughput_mbps(),
            chunks: self.chunks,
            error: self.error_message(),
            failed_stage,
            checksum_original: self.original_checksum,
            checksum_verified: self.checksum_verified(),
        }
        .serialize(s)
    }
}
