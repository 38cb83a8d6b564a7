use std::io::{Result, Write};

use crate::hash::ChecksumHasher;

/// Write adapter that digests every byte it forwards. Lets a decoder stream
/// straight into a checksum without a staging buffer.
pub struct HashingForward<'a, W: Write> {
    inner: W,
    hasher: &'a mut ChecksumHasher,
    forwarded: u64,
}

impl<'a, W: Write> HashingForward<'a, W> {
    pub fn new(inner: W, hasher: &'a mut ChecksumHasher) -> Self {
        Self {
            inner,
            hasher,
            forwarded: 0,
        }
    }

    /// Bytes the inner writer accepted, and therefore hashed.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}

impl<W: Write> Write for HashingForward<'_, W> {
    // Hash only what the inner writer took so a short write is not counted twice.
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.forwarded += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
