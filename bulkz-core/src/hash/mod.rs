//! Streaming, non-cryptographic digests used for round-trip verification.
//!
//! xxHash64 is preferred. Builds without the `xxhash` feature fall back to
//! CRC32, which is always available through flate2.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::util::chunks::ChunkSource;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    Xxh64,
    Crc32,
}

impl DigestKind {
    /// Best digest compiled into this build.
    pub fn preferred() -> Self {
        if Self::Xxh64.is_available() {
            Self::Xxh64
        } else {
            Self::Crc32
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Self::Xxh64 => cfg!(feature = "xxhash"),
            Self::Crc32 => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Xxh64 => "xxh64",
            Self::Crc32 => "crc32",
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Finished digest. Values of different kinds never compare equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    Xxh64(u64),
    Crc32(u32),
}

impl Checksum {
    pub fn kind(&self) -> DigestKind {
        match self {
            Self::Xxh64(_) => DigestKind::Xxh64,
            Self::Crc32(_) => DigestKind::Crc32,
        }
    }

    /// Lowercase, zero-padded, big-endian hex: 16 chars for xxh64, 8 for crc32.
    pub fn to_hex(&self) -> String {
        match self {
            Self::Xxh64(v) => hex::encode(v.to_be_bytes()),
            Self::Crc32(v) => hex::encode(v.to_be_bytes()),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

enum State {
    #[cfg(feature = "xxhash")]
    Xxh64(twox_hash::XxHash64),
    Crc32(flate2::Crc),
}

/// Incremental digest over an ordered byte stream.
pub struct ChecksumHasher {
    state: State,
}

impl ChecksumHasher {
    pub fn new(kind: DigestKind) -> Result<Self> {
        let state = match kind {
            #[cfg(feature = "xxhash")]
            DigestKind::Xxh64 => State::Xxh64(twox_hash::XxHash64::with_seed(0)),
            #[cfg(not(feature = "xxhash"))]
            DigestKind::Xxh64 => {
                return Err(crate::error::BulkzError::DigestUnavailable(kind.name()));
            }
            DigestKind::Crc32 => State::Crc32(flate2::Crc::new()),
        };
        Ok(Self { state })
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.state {
            #[cfg(feature = "xxhash")]
            State::Xxh64(h) => std::hash::Hasher::write(h, bytes),
            State::Crc32(c) => c.update(bytes),
        }
    }

    pub fn finalize(&self) -> Checksum {
        match &self.state {
            #[cfg(feature = "xxhash")]
            State::Xxh64(h) => Checksum::Xxh64(std::hash::Hasher::finish(h)),
            State::Crc32(c) => Checksum::Crc32(c.sum()),
        }
    }
}

/// Digest every block of a chunk sequence, propagating the first read error.
pub fn digest_chunks<I>(kind: DigestKind, chunks: I) -> Result<Checksum>
where
    I: IntoIterator<Item = std::io::Result<Vec<u8>>>,
{
    let mut hasher = ChecksumHasher::new(kind)?;
    for chunk in chunks {
        hasher.update(&chunk?);
    }
    Ok(hasher.finalize())
}

pub fn digest_reader<R: Read>(kind: DigestKind, reader: R, chunk_size: usize) -> Result<Checksum> {
    digest_chunks(kind, ChunkSource::new(reader, chunk_size))
}

pub fn digest_file(kind: DigestKind, path: &Path, chunk_size: usize) -> Result<Checksum> {
    digest_chunks(kind, ChunkSource::open(path, chunk_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn crc32_matches_reference_vector() {
        // CRC-32/ISO-HDLC check value for "123456789".
        let sum = digest_reader(DigestKind::Crc32, Cursor::new(b"123456789"), 4).unwrap();
        assert_eq!(sum, Checksum::Crc32(0xCBF4_3926));
        assert_eq!(sum.to_hex(), "cbf43926");
    }

    #[cfg(feature = "xxhash")]
    #[test]
    fn xxh64_of_empty_input_matches_reference() {
        let sum = digest_reader(DigestKind::Xxh64, Cursor::new(Vec::new()), 16).unwrap();
        assert_eq!(sum.to_hex(), "ef46db3751d8e999");
    }

    #[test]
    fn chunking_does_not_change_the_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let kind = DigestKind::preferred();
        let a = digest_reader(kind, Cursor::new(&data), 1).unwrap();
        let b = digest_reader(kind, Cursor::new(&data), 333).unwrap();
        let c = digest_reader(kind, Cursor::new(&data), 1 << 20).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn different_content_gives_different_digest() {
        let kind = DigestKind::preferred();
        let a = digest_reader(kind, Cursor::new(b"hello world"), 4).unwrap();
        let b = digest_reader(kind, Cursor::new(b"hello worle"), 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn kinds_never_compare_equal() {
        assert_ne!(Checksum::Crc32(0), Checksum::Xxh64(0));
        assert_eq!(Checksum::Xxh64(1).to_hex().len(), 16);
        assert_eq!(Checksum::Crc32(1).to_hex().len(), 8);
    }

    #[test]
    fn read_error_propagates() {
        let chunks = vec![Ok(vec![1u8, 2, 3]), Err(std::io::Error::other("boom"))];
        assert!(digest_chunks(DigestKind::Crc32, chunks).is_err());
    }

    #[test]
    fn preferred_kind_is_available() {
        assert!(DigestKind::preferred().is_available());
    }
}
