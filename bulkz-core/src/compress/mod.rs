//! Single-file streaming compression with optional round-trip verification.
//!
//! Each file moves through `sized -> checksummed -> compressed -> verified`.
//! The checksum and verification steps only run when integrity checking is
//! enabled. Any failure removes the output this attempt created and leaves the
//! original untouched.

pub mod destination;
pub mod result;

pub use destination::{Destination, FsDestination, OutputFile};
pub use result::{CompressionResult, Compressed, FileFailure, Stage};

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::codec::Codec;
use crate::config::CompressionConfig;
use crate::error::Result;
use crate::events::{EventSink, TracingSink};
use crate::hash::{Checksum, ChecksumHasher, DigestKind};
use crate::util::chunks::ChunkSource;
use crate::util::counting::CountingWriter;
use crate::util::hash_forward::HashingForward;

type StageResult<T> = std::result::Result<T, FileFailure>;

/// Bookkeeping filled in as a file moves through its stages.
#[derive(Default)]
struct Attempt {
    original_size: u64,
    chunks: u64,
    checksum: Option<Checksum>,
    created_output: bool,
}

pub struct StreamingCompressor {
    config: Arc<CompressionConfig>,
    codec: Codec,
    digest: DigestKind,
    destination: Arc<dyn Destination>,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
}

impl StreamingCompressor {
    pub fn new(config: Arc<CompressionConfig>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            codec: Codec::detect(),
            digest: DigestKind::preferred(),
            destination: Arc::new(FsDestination),
            events: Arc::new(TracingSink),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_codec(mut self, codec: Codec) -> Result<Self> {
        codec.compressor()?;
        self.codec = codec;
        Ok(self)
    }

    pub fn with_digest(mut self, digest: DigestKind) -> Result<Self> {
        ChecksumHasher::new(digest)?;
        self.digest = digest;
        Ok(self)
    }

    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Arc<CompressionConfig> {
        &self.config
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn digest(&self) -> DigestKind {
        self.digest
    }

    /// `<input>.<codec-ext>`, e.g. `data.csv` -> `data.csv.zst`.
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        let mut name = OsString::from(input.as_os_str());
        name.push(self.codec.extension());
        PathBuf::from(name)
    }

    /// Compress `input` to `output` (or the default path) with this
    /// compressor's configuration. Never panics on I/O problems; every failure
    /// is reported in the returned result.
    pub fn compress_file(&self, input: &Path, output: Option<&Path>) -> CompressionResult {
        self.compress_with(&self.config, input, output)
    }

    pub(crate) fn compress_with(
        &self,
        config: &CompressionConfig,
        input: &Path,
        output: Option<&Path>,
    ) -> CompressionResult {
        let started = Instant::now();
        let output_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_path(input));

        let mut attempt = Attempt::default();
        let outcome = if output_path == input {
            Err(FileFailure::OutputCollision(output_path.clone()))
        } else {
            self.run(config, input, &output_path, &mut attempt)
        };

        if outcome.is_err() && attempt.created_output {
            remove_partial(&output_path);
        }

        let result = CompressionResult {
            input_path: input.to_path_buf(),
            output_path,
            original_size: attempt.original_size,
            elapsed: started.elapsed(),
            chunks: attempt.chunks,
            original_checksum: attempt.checksum,
            outcome,
        };

        if result.success() && config.delete_original {
            match fs::remove_file(input) {
                Ok(()) => self.events.original_deleted(input),
                Err(e) => tracing::warn!(
                    path = %input.display(),
                    error = %e,
                    "compressed output is valid but the original could not be deleted"
                ),
            }
        }
        result
    }

    fn run(
        &self,
        config: &CompressionConfig,
        input: &Path,
        output: &Path,
        attempt: &mut Attempt,
    ) -> StageResult<Compressed> {
        let meta = fs::metadata(input).map_err(|e| self.io_failure(Stage::Sizing, e))?;
        if !meta.is_file() {
            return Err(FileFailure::io(Stage::Sizing, "not a regular file"));
        }
        attempt.original_size = meta.len();
        self.events.file_started(input, attempt.original_size);

        if config.verify_integrity {
            let sum = self.checksum_input(input, config.chunk_size)?;
            tracing::debug!(path = %input.display(), checksum = %sum, "checksummed");
            attempt.checksum = Some(sum);
        }

        let compressed_size = self.compress_stream(config, input, output, attempt)?;
        tracing::debug!(
            path = %input.display(),
            chunks = attempt.chunks,
            compressed_size,
            "compressed"
        );

        let verified = match attempt.checksum {
            Some(expected) => {
                self.verify_output(output, expected, config.chunk_size)?;
                true
            }
            None => false,
        };

        Ok(Compressed {
            compressed_size,
            verified,
        })
    }

    fn checksum_input(&self, input: &Path, chunk_size: usize) -> StageResult<Checksum> {
        let stage = Stage::Checksumming;
        let mut hasher =
            ChecksumHasher::new(self.digest).map_err(|e| FileFailure::io(stage, e))?;
        let source = ChunkSource::open(input, chunk_size).map_err(|e| self.io_failure(stage, e))?;
        for chunk in source {
            self.check_cancel()?;
            hasher.update(&chunk.map_err(|e| self.io_failure(stage, e))?);
        }
        Ok(hasher.finalize())
    }

    fn compress_stream(
        &self,
        config: &CompressionConfig,
        input: &Path,
        output: &Path,
        attempt: &mut Attempt,
    ) -> StageResult<u64> {
        let stage = Stage::Compressing;
        let fail = |e: std::io::Error| self.io_failure(stage, e);

        let compressor = self
            .codec
            .compressor()
            .map_err(|e| FileFailure::io(stage, e))?;
        let mut source = ChunkSource::open(input, config.chunk_size).map_err(fail)?;
        let file = self.destination.create(output).map_err(fail)?;
        attempt.created_output = true;

        let mut sink = CountingWriter::new(BufWriter::with_capacity(config.chunk_size, file));
        {
            let mut enc = compressor
                .encoder(&mut sink, config.level)
                .map_err(|e| FileFailure::io(stage, e))?;
            for chunk in source.by_ref() {
                self.check_cancel()?;
                enc.write_all(&chunk.map_err(fail)?).map_err(fail)?;
            }
            enc.finish().map_err(fail)?;
        }
        attempt.chunks = source.chunks_read();

        let compressed_size = sink.written();
        let mut file = sink
            .into_inner()
            .into_inner()
            .map_err(|e| fail(e.into_error()))?;
        if config.delete_original {
            file.sync().map_err(fail)?;
        }
        Ok(compressed_size)
    }

    /// Decode `output` and compare its digest with `expected`. Any decode
    /// error counts as a mismatch.
    fn verify_output(&self, output: &Path, expected: Checksum, chunk_size: usize) -> StageResult<()> {
        match self.decoded_checksum(output, expected.kind(), chunk_size) {
            Ok(actual) if actual == expected => Ok(()),
            Ok(actual) => {
                tracing::warn!(
                    path = %output.display(),
                    %expected,
                    %actual,
                    "decoded output does not match original"
                );
                Err(FileFailure::Verification {
                    expected,
                    actual: Some(actual),
                })
            }
            Err(_) if self.cancel.is_cancelled() => Err(FileFailure::Interrupted),
            Err(e) => {
                tracing::warn!(path = %output.display(), error = %e, "output could not be decoded");
                Err(FileFailure::Verification {
                    expected,
                    actual: None,
                })
            }
        }
    }

    fn decoded_checksum(&self, output: &Path, kind: DigestKind, chunk_size: usize) -> Result<Checksum> {
        let compressor = self.codec.compressor()?;
        let mut hasher = ChecksumHasher::new(kind)?;
        let mut src = File::open(output)?;
        {
            let mut sink = HashingForward::new(
                CancelAwareSink {
                    cancel: &self.cancel,
                },
                &mut hasher,
            );
            compressor.decompress(&mut src, &mut sink, chunk_size)?;
            tracing::debug!(path = %output.display(), decoded = sink.forwarded(), "decoded for verification");
        }
        Ok(hasher.finalize())
    }

    fn check_cancel(&self) -> StageResult<()> {
        if self.cancel.is_cancelled() {
            Err(FileFailure::Interrupted)
        } else {
            Ok(())
        }
    }

    fn io_failure(&self, stage: Stage, err: std::io::Error) -> FileFailure {
        if self.cancel.is_cancelled() {
            FileFailure::Interrupted
        } else {
            FileFailure::io(stage, err)
        }
    }
}

/// Discards bytes, but errors once cancellation is requested so long decodes
/// stop promptly.
struct CancelAwareSink<'a> {
    cancel: &'a CancelToken,
}

impl Write for CancelAwareSink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::other("cancelled"));
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "could not remove partial output"
        ),
    }
}
