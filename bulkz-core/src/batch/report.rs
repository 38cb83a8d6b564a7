use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::codec::Codec;
use crate::compress::CompressionResult;
use crate::compress::result::{mib_per_sec, ratio_percent};
use crate::config::CompressionConfig;
use crate::hash::DigestKind;

/// Running, order-independent sums over completed files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub files: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sums over successful files only.
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

impl BatchTotals {
    pub fn record(&mut self, r: &CompressionResult) {
        self.files += 1;
        if r.success() {
            self.successful += 1;
            self.original_bytes += r.original_size;
            self.compressed_bytes += r.compressed_size();
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_original_size_bytes: u64,
    pub total_compressed_size_bytes: u64,
    pub overall_compression_ratio: f64,
    pub total_time_seconds: f64,
    pub throughput_mbps: f64,
    pub space_saved_bytes: i64,
    pub workers_used: usize,
}

/// Aggregate outcome of one batch run. Read-only once built.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub timestamp: String,
    pub summary: BatchSummary,
    pub compression_engine: Codec,
    pub checksum_algorithm: DigestKind,
    pub config: CompressionConfig,
    /// Completion order.
    pub results: Vec<CompressionResult>,
    pub errors: Vec<CompressionResult>,
}

impl BatchReport {
    pub fn build(
        totals: &BatchTotals,
        elapsed: Duration,
        codec: Codec,
        digest: DigestKind,
        config: &CompressionConfig,
        results: Vec<CompressionResult>,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let errors = results.iter().filter(|r| !r.success()).cloned().collect();
        Self {
            timestamp: now_rfc3339(),
            summary: BatchSummary {
                total_files: totals.files,
                successful: totals.successful,
                failed: totals.failed,
                total_original_size_bytes: totals.original_bytes,
                total_compressed_size_bytes: totals.compressed_bytes,
                overall_compression_ratio: ratio_percent(
                    totals.original_bytes,
                    totals.compressed_bytes,
                ),
                total_time_seconds: secs,
                throughput_mbps: mib_per_sec(totals.original_bytes, secs),
                space_saved_bytes: totals.original_bytes as i64 - totals.compressed_bytes as i64,
                workers_used: config.workers,
            },
            compression_engine: codec,
            checksum_algorithm: digest,
            config: config.clone(),
            results,
            errors,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.summary.failed == 0
    }
}

pub(crate) fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{Compressed, FileFailure, Stage};
    use std::path::PathBuf;

    fn result(name: &str, original: u64, compressed: Option<u64>) -> CompressionResult {
        CompressionResult {
            input_path: PathBuf::from(name),
            output_path: PathBuf::from(format!("{name}.zst")),
            original_size: original,
            elapsed: Duration::from_millis(10),
            chunks: 1,
            original_checksum: None,
            outcome: match compressed {
                Some(c) => Ok(Compressed {
                    compressed_size: c,
                    verified: false,
                }),
                None => Err(FileFailure::io(Stage::Compressing, "boom")),
            },
        }
    }

    #[test]
    fn totals_only_count_successful_bytes() {
        let rs = vec![
            result("a", 1000, Some(250)),
            result("b", 3000, Some(750)),
            result("c", 9999, None),
        ];
        let mut totals = BatchTotals::default();
        for r in &rs {
            totals.record(r);
        }
        let cfg = CompressionConfig {
            workers: 3,
            ..Default::default()
        };
        let report = BatchReport::build(
            &totals,
            Duration::from_secs(2),
            Codec::Zstd,
            DigestKind::Xxh64,
            &cfg,
            rs,
        );

        let s = &report.summary;
        assert_eq!((s.total_files, s.successful, s.failed), (3, 2, 1));
        assert_eq!(s.total_original_size_bytes, 4000);
        assert_eq!(s.total_compressed_size_bytes, 1000);
        assert_eq!(s.space_saved_bytes, 3000);
        assert!((s.overall_compression_ratio - 75.0).abs() < 1e-9);
        assert_eq!(s.workers_used, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn totals_are_order_independent() {
        let rs = [
            result("a", 10, Some(5)),
            result("b", 20, None),
            result("c", 30, Some(3)),
        ];
        let mut fwd = BatchTotals::default();
        rs.iter().for_each(|r| fwd.record(r));
        let mut rev = BatchTotals::default();
        rs.iter().rev().for_each(|r| rev.record(r));
        assert_eq!(fwd, rev);
    }

    #[test]
    fn empty_report_serializes() {
        let report = BatchReport::build(
            &BatchTotals::default(),
            Duration::ZERO,
            Codec::Gzip,
            DigestKind::Crc32,
            &CompressionConfig::default(),
            Vec::new(),
        );
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["compression_engine"], "gzip");
        assert_eq!(v["checksum_algorithm"], "crc32");
        assert_eq!(v["summary"]["total_files"], 0);
        assert_eq!(v["summary"]["overall_compression_ratio"], 0.0);
        assert_eq!(v["config"]["chunk_size"], 65536);
        assert!(report.all_succeeded());
        assert!(report.timestamp.contains('T'));
    }
}
