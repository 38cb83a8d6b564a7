use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Lazy, non-restartable sequence of fixed-size blocks read from the start of
/// a stream. Every block but the last is exactly `chunk_size` bytes.
///
/// After a read error the error is yielded once and the sequence ends; no
/// partially filled block is emitted.
pub struct ChunkSource<R: Read> {
    inner: R,
    chunk_size: usize,
    chunks: u64,
    bytes: u64,
    done: bool,
}

impl ChunkSource<File> {
    pub fn open(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let f = File::open(path)?;
        Ok(Self::new(f, chunk_size))
    }
}

impl<R: Read> ChunkSource<R> {
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
            chunks: 0,
            bytes: 0,
            done: false,
        }
    }

    /// Number of blocks yielded so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // Short reads are refilled so only the final block can be shorter.
    fn fill(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

impl<R: Read> Iterator for ChunkSource<R> {
    type Item = std::io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(buf) if buf.is_empty() => {
                self.done = true;
                None
            }
            Ok(buf) => {
                if buf.len() < self.chunk_size {
                    self.done = true;
                }
                self.chunks += 1;
                self.bytes += buf.len() as u64;
                Some(Ok(buf))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
