pub mod handlers;
pub mod interrupt;

use std::sync::Arc;

use crate::presentation::cli::Cli;
use crate::presentation::progress::ProgressSink;
use bulkz_core::BulkzError;
use clap::Parser;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Parse arguments, run one batch and map the outcome to a process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let progress = Arc::new(ProgressSink::new(!cli.no_progress));

    match handlers::handle_compress(cli, progress.clone()) {
        Ok(report) if report.all_succeeded() => EXIT_OK,
        Ok(_) => EXIT_FAILURE,
        Err(BulkzError::Interrupted { completed, total }) => {
            progress.finish();
            eprintln!("Interrupted: {completed} of {total} files finished, partial outputs removed");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            progress.finish();
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    }
}
