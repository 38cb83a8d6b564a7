#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod events;

pub mod util {
    pub mod chunks;
    pub mod counting;
    pub mod hash_forward;
}

pub mod hash;

pub mod codec;

pub mod scan {
    pub mod walker;
}

pub mod compress;

pub mod batch;

// Re-exports: stable API surface
pub use batch::{BatchReport, BatchSummary, ErrorLog, ParallelCompressor, WorkItem};
pub use cancel::CancelToken;
pub use codec::Codec;
pub use compress::{CompressionResult, FileFailure, Stage, StreamingCompressor};
pub use config::CompressionConfig;
pub use error::{BulkzError, Result};
pub use events::{EventSink, NullSink, TracingSink};
pub use hash::{Checksum, DigestKind};
pub use scan::walker::{Candidate, find_candidates};
