//! Fans compression work across a fixed-size worker pool and folds the
//! results into a [`BatchReport`].

pub mod error_log;
pub mod report;

pub use error_log::ErrorLog;
pub use report::{BatchReport, BatchSummary, BatchTotals};

use std::any::Any;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use rayon::ThreadPoolBuilder;

use crate::cancel::CancelToken;
use crate::codec::Codec;
use crate::compress::{CompressionResult, Destination, FileFailure, StreamingCompressor};
use crate::config::CompressionConfig;
use crate::error::{BulkzError, Result};
use crate::events::{EventSink, TracingSink};
use crate::hash::DigestKind;
use crate::scan::walker::{Candidate, find_candidates};

/// One unit of pool work. Built by the orchestrator and consumed by exactly
/// one worker.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub input: PathBuf,
    /// `None` writes next to the input.
    pub output: Option<PathBuf>,
    pub size: u64,
    pub config: Arc<CompressionConfig>,
}

pub struct ParallelCompressor {
    engine: StreamingCompressor,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
}

impl ParallelCompressor {
    pub fn new(config: CompressionConfig) -> Result<Self> {
        let events: Arc<dyn EventSink> = Arc::new(TracingSink);
        let cancel = CancelToken::new();
        let engine = StreamingCompressor::new(Arc::new(config))?
            .with_events(events.clone())
            .with_cancel(cancel.clone());
        Ok(Self {
            engine,
            events,
            cancel,
        })
    }

    pub fn with_codec(mut self, codec: Codec) -> Result<Self> {
        self.engine = self.engine.with_codec(codec)?;
        Ok(self)
    }

    pub fn with_digest(mut self, digest: DigestKind) -> Result<Self> {
        self.engine = self.engine.with_digest(digest)?;
        Ok(self)
    }

    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.engine = self.engine.with_destination(destination);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.engine = self.engine.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.engine = self.engine.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CompressionConfig {
        self.engine.config()
    }

    pub fn codec(&self) -> Codec {
        self.engine.codec()
    }

    pub fn digest(&self) -> DigestKind {
        self.engine.digest()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Discover files under `dir` and compress them all.
    ///
    /// A missing or non-directory `dir` is fatal. Finding nothing is not: the
    /// report is simply empty.
    pub fn compress_directory(&self, dir: &Path) -> Result<BatchReport> {
        let candidates = find_candidates(dir, self.config(), self.events.as_ref())?;
        tracing::debug!(dir = %dir.display(), found = candidates.len(), "discovery finished");
        self.run(candidates)
    }

    /// Compress an explicit list of files. Size and extension filters do not
    /// apply; entries that are missing or not regular files are dropped with a
    /// warning. Fails with [`BulkzError::NoValidFiles`] if nothing is left.
    ///
    /// Several spellings of one file (relative and absolute, `..`, symlinks)
    /// collapse to the first one listed.
    pub fn compress_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<BatchReport> {
        let mut candidates = Vec::with_capacity(paths.len());
        let mut seen = HashSet::new();
        for p in paths {
            let path = p.as_ref();
            let md = match fs::metadata(path) {
                Ok(md) if md.is_file() => md,
                Ok(_) => {
                    self.events.input_rejected(path, "not a regular file");
                    continue;
                }
                Err(e) => {
                    self.events.input_rejected(path, &e.to_string());
                    continue;
                }
            };
            let real = match fs::canonicalize(path) {
                Ok(real) => real,
                Err(e) => {
                    self.events.input_rejected(path, &e.to_string());
                    continue;
                }
            };
            if !seen.insert(real) {
                self.events.input_rejected(path, "same file listed more than once");
                continue;
            }
            candidates.push(Candidate {
                path: path.to_path_buf(),
                size: md.len(),
            });
        }
        if candidates.is_empty() {
            return Err(BulkzError::NoValidFiles);
        }
        candidates.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        self.run(candidates)
    }

    /// Where `input` is written: next to it, or under `output_dir` by file name.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        match (&self.config().output_dir, input.file_name()) {
            (Some(dir), Some(name)) => self.engine.default_output_path(&dir.join(name)),
            _ => self.engine.default_output_path(input),
        }
    }

    /// Map candidates to work items. An output that another item already
    /// claims, or that is itself one of the inputs, becomes a failed result
    /// up front.
    ///
    /// Paths are compared by the file they resolve to, not by spelling.
    fn plan(&self, candidates: Vec<Candidate>) -> (Vec<WorkItem>, Vec<CompressionResult>) {
        let inputs: HashSet<PathBuf> = candidates
            .iter()
            .map(|c| fs::canonicalize(&c.path).unwrap_or_else(|_| resolve_parent(&c.path)))
            .collect();
        let mut claimed = HashSet::new();
        let mut items = Vec::with_capacity(candidates.len());
        let mut rejected = Vec::new();

        let explicit = self.config().output_dir.is_some();
        for c in candidates {
            let output = self.output_path_for(&c.path);
            let target = resolve_parent(&output);
            if inputs.contains(&target) || !claimed.insert(target) {
                let failure = FileFailure::OutputCollision(output.clone());
                rejected.push(CompressionResult::not_run(&c.path, &output, failure));
                continue;
            }
            items.push(WorkItem {
                input: c.path,
                output: explicit.then_some(output),
                size: c.size,
                config: self.engine.config().clone(),
            });
        }
        (items, rejected)
    }

    fn run(&self, candidates: Vec<Candidate>) -> Result<BatchReport> {
        let config = self.config();
        if let Some(dir) = &config.output_dir {
            fs::create_dir_all(dir)?;
        }

        let started = Instant::now();
        let total = candidates.len();
        let bytes = candidates.iter().map(|c| c.size).sum();
        let (items, rejected) = self.plan(candidates);
        self.events.batch_started(total, bytes, config.workers);

        let log = ErrorLog::new(&config.error_log);
        let mut collector = Collector {
            events: self.events.as_ref(),
            log: &log,
            totals: BatchTotals::default(),
            results: Vec::with_capacity(total),
            total,
        };
        for r in rejected {
            collector.record(r);
        }

        if !items.is_empty() && !self.cancel.is_cancelled() {
            self.dispatch(items, &mut collector)?;
        }

        let Collector {
            totals, results, ..
        } = collector;
        if self.cancel.is_cancelled() {
            tracing::warn!(completed = totals.files, total, "batch interrupted");
            return Err(BulkzError::Interrupted {
                completed: totals.files,
                total,
            });
        }

        let report = BatchReport::build(
            &totals,
            started.elapsed(),
            self.codec(),
            self.digest(),
            config,
            results,
        );
        self.events.batch_finished(&report);
        Ok(report)
    }

    /// Run `items` on a pool of `workers` threads, keeping at most that many
    /// in flight. Results are handed to `collector` as they complete. Once
    /// cancelled, nothing new is dispatched and in-flight files wind down.
    fn dispatch(&self, items: Vec<WorkItem>, collector: &mut Collector<'_>) -> Result<()> {
        let workers = self.config().workers;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("bulkz-worker-{i}"))
            .build()
            .map_err(|e| BulkzError::Pool(e.to_string()))?;

        let (tx, rx) = crossbeam_channel::unbounded::<CompressionResult>();
        let mut queue = items.into_iter();
        let mut in_flight = 0usize;

        pool.in_place_scope(|scope| {
            let spawn = |item: WorkItem, tx: Sender<CompressionResult>| {
                scope.spawn(move |_| {
                    let _ = tx.send(self.compress_item(item));
                });
            };

            for item in queue.by_ref().take(workers) {
                spawn(item, tx.clone());
                in_flight += 1;
            }

            while in_flight > 0 {
                let Ok(result) = rx.recv() else { break };
                in_flight -= 1;
                collector.record(result);

                if self.cancel.is_cancelled() {
                    continue;
                }
                if let Some(item) = queue.next() {
                    spawn(item, tx.clone());
                    in_flight += 1;
                }
            }
        });
        Ok(())
    }

    /// Runs on a worker thread. A panic becomes a failed result instead of
    /// tearing down the batch.
    fn compress_item(&self, item: WorkItem) -> CompressionResult {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine
                .compress_with(&item.config, &item.input, item.output.as_deref())
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(path = %item.input.display(), %message, "worker panicked");
            let output = item
                .output
                .clone()
                .unwrap_or_else(|| self.engine.default_output_path(&item.input));
            let mut r = CompressionResult::not_run(
                &item.input,
                &output,
                FileFailure::WorkerPanic(message),
            );
            r.original_size = item.size;
            r
        })
    }
}

/// Orchestrator-side state. Only the dispatching thread touches it.
struct Collector<'a> {
    events: &'a dyn EventSink,
    log: &'a ErrorLog,
    totals: BatchTotals,
    results: Vec<CompressionResult>,
    total: usize,
}

impl Collector<'_> {
    fn record(&mut self, result: CompressionResult) {
        self.totals.record(&result);
        if let Some(message) = result.error_message() {
            if let Err(e) = self.log.append(&result.input_path, &message) {
                tracing::warn!(
                    log = %self.log.path().display(),
                    error = %e,
                    "could not append to error log"
                );
            }
        }
        self.events
            .file_finished(&result, self.totals.files, self.total);
        self.results.push(result);
    }
}

/// `path` with its parent directory canonicalized. Works for files that do
/// not exist yet, such as outputs.
fn resolve_parent(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match fs::canonicalize(parent) {
        Ok(dir) => dir.join(name),
        Err(_) => path.to_path_buf(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
