use std::fs;
use std::path::Path;
use std::sync::Arc;

use bulkz_core::config::default_workers;
use bulkz_core::error::{BulkzError, Result};
use bulkz_core::{BatchReport, CompressionConfig, ParallelCompressor};
use indicatif::HumanBytes;

use super::interrupt;
use crate::presentation::cli::Cli;
use crate::presentation::progress::ProgressSink;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Translate CLI units (MB, KB, flags) into an engine configuration.
pub fn build_config(cli: &Cli) -> Result<CompressionConfig> {
    let chunk_size = cli
        .chunk_size_kb
        .checked_mul(KIB)
        .and_then(|b| usize::try_from(b).ok())
        .ok_or_else(|| too_large("chunk size", cli.chunk_size_kb, "KB"))?;
    let min_file_size = cli
        .min_size_mb
        .checked_mul(MIB)
        .ok_or_else(|| too_large("minimum size", cli.min_size_mb, "MB"))?;
    let workers = match cli.workers {
        Some(w) => usize::try_from(w)
            .map_err(|_| too_large("worker count", w, "threads"))?,
        None => default_workers(),
    };

    let base = CompressionConfig {
        chunk_size,
        min_file_size,
        workers,
        level: cli.level,
        delete_original: cli.delete_original,
        verify_integrity: !cli.no_verify,
        output_dir: cli.output_dir.clone(),
        error_log: cli.error_log.clone(),
        ..Default::default()
    };

    let include = (!cli.include_ext.is_empty()).then_some(&cli.include_ext);
    let config = base.with_include_extensions(include);
    Ok(match &cli.exclude_ext {
        Some(exts) => config.with_exclude_extensions(exts),
        None => config,
    })
}

fn too_large(what: &str, value: u64, unit: &str) -> BulkzError {
    BulkzError::Config(format!("{what} of {value} {unit} is too large"))
}

pub fn handle_compress(cli: Cli, progress: Arc<ProgressSink>) -> Result<BatchReport> {
    let config = build_config(&cli)?;
    let engine = ParallelCompressor::new(config)?.with_events(progress);
    interrupt::install(engine.cancel_token())?;

    let report = match &cli.target {
        Some(dir) => {
            print_banner(&engine, &dir.display().to_string());
            engine.compress_directory(dir)?
        }
        None => {
            print_banner(&engine, &format!("{} explicit file(s)", cli.files.len()));
            engine.compress_files(&cli.files)?
        }
    };

    print_summary(&report, engine.config());
    if let Some(path) = &cli.json_report {
        write_json_report(path, &report)?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(report)
}

/// Serializes fully before touching `path`, so a failure never leaves a
/// truncated report behind.
pub fn write_json_report(path: &Path, report: &BatchReport) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(report).map_err(std::io::Error::from)?;
    json.push(b'\n');
    fs::write(path, json)?;
    Ok(())
}

fn print_banner(engine: &ParallelCompressor, target: &str) {
    let cfg = engine.config();
    eprintln!("bulkz: compressing {target}");
    eprintln!(
        "  engine {} (level {}), {} workers, {} chunks, verify {}",
        engine.codec(),
        engine.codec().clamp_level(cfg.level),
        cfg.workers,
        HumanBytes(cfg.chunk_size as u64),
        if cfg.verify_integrity { "on" } else { "off" },
    );
    if let Some(dir) = &cfg.output_dir {
        eprintln!("  output dir {}", dir.display());
    }
    if cfg.delete_original {
        eprintln!("  originals are deleted after verified compression");
    }
}

fn print_summary(report: &BatchReport, config: &CompressionConfig) {
    let s = &report.summary;
    eprintln!();
    eprintln!("Compression summary");
    eprintln!("  files       {} ({} ok, {} failed)", s.total_files, s.successful, s.failed);
    eprintln!(
        "  size        {} -> {} ({:.1}% saved)",
        HumanBytes(s.total_original_size_bytes),
        HumanBytes(s.total_compressed_size_bytes),
        s.overall_compression_ratio,
    );
    eprintln!(
        "  time        {:.2}s ({:.1} MiB/s)",
        s.total_time_seconds, s.throughput_mbps
    );
    eprintln!("  workers     {}", s.workers_used);
    eprintln!("  engine      {}", report.compression_engine);
    if s.failed > 0 {
        eprintln!("  errors logged to {}", config.error_log.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn build_config_ok(cli: &Cli) -> CompressionConfig {
        build_config(cli).unwrap()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bulkz").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn units_are_converted() {
        let cfg = build_config_ok(&parse(&[
            "/d",
            "--min-size",
            "5",
            "--chunk-size",
            "128",
            "--workers",
            "3",
            "--level",
            "9",
        ]));
        assert_eq!(cfg.min_file_size, 5 * 1024 * 1024);
        assert_eq!(cfg.chunk_size, 128 * 1024);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.level, 9);
        assert!(cfg.verify_integrity);
    }

    #[test]
    fn flags_map_to_config() {
        let cfg = build_config_ok(&parse(&[
            "/d",
            "--no-verify",
            "--delete-original",
            "--output-dir",
            "/out",
            "--error-log",
            "/tmp/e.log",
        ]));
        assert!(!cfg.verify_integrity);
        assert!(cfg.delete_original);
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/out")));
        assert_eq!(cfg.error_log, PathBuf::from("/tmp/e.log"));
    }

    #[test]
    fn default_excludes_survive_unless_replaced() {
        let cfg = build_config_ok(&parse(&["/d"]));
        assert!(cfg.exclude_extensions.contains(".zst"));
        assert!(cfg.include_extensions.is_none());
        assert!(cfg.workers >= 1);

        let cfg = build_config_ok(&parse(&["/d", "--exclude-ext", "TMP", "--include-ext", "log"]));
        assert_eq!(cfg.exclude_extensions.len(), 1);
        assert!(cfg.exclude_extensions.contains(".tmp"));
        assert!(cfg.include_extensions.unwrap().contains(".log"));
    }

    #[test]
    fn oversized_units_are_config_errors() {
        let huge = u64::MAX.to_string();
        let err = build_config(&parse(&["/d", "--chunk-size", huge.as_str()])).unwrap_err();
        assert!(matches!(err, BulkzError::Config(_)));
        let err = build_config(&parse(&["/d", "--min-size", huge.as_str()])).unwrap_err();
        assert!(matches!(err, BulkzError::Config(_)));
        assert!(build_config(&parse(&["/d", "--min-size", "1024"])).is_ok());
    }

    #[test]
    fn json_report_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CompressionConfig {
            min_file_size: 0,
            workers: 1,
            error_log: dir.path().join("e.log"),
            ..Default::default()
        };
        let report = ParallelCompressor::new(cfg)
            .unwrap()
            .with_events(Arc::new(bulkz_core::NullSink))
            .compress_directory(dir.path())
            .unwrap();

        let path = dir.path().join("report.json");
        write_json_report(&path, &report).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["summary"]["total_files"], 0);
        assert_eq!(v["summary"]["workers_used"], 1);
        assert!(v["results"].as_array().unwrap().is_empty());
    }
}
