use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Codec used for a whole run. Selected once per process by [`Codec::detect`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Zstd,
    Gzip,
}

impl Codec {
    /// zstd when compiled in, gzip otherwise.
    pub fn detect() -> Self {
        if Self::Zstd.is_available() {
            Self::Zstd
        } else {
            Self::Gzip
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Self::Zstd => cfg!(feature = "zstd"),
            Self::Gzip => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
        }
    }

    /// Suffix appended to the full input file name.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zstd => ".zst",
            Self::Gzip => ".gz",
        }
    }

    pub fn clamp_level(self, level: i32) -> i32 {
        match self {
            Self::Zstd => level.clamp(1, 22),
            Self::Gzip => level.clamp(0, 9),
        }
    }

    pub fn compressor(self) -> Result<&'static dyn Compressor> {
        match self {
            #[cfg(feature = "zstd")]
            Self::Zstd => Ok(&zstdc::ZstdCompressor),
            #[cfg(not(feature = "zstd"))]
            Self::Zstd => Err(crate::error::BulkzError::CodecUnavailable(self.name())),
            Self::Gzip => Ok(&gzip::GzipCompressor),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming encoder. Bytes written are compressed into the sink it was
/// created over; `finish` writes the trailer.
pub trait StreamEncoder: Write {
    fn finish(self: Box<Self>) -> std::io::Result<()>;
}

pub trait Compressor: Send + Sync {
    fn codec(&self) -> Codec;
    fn encoder<'a>(
        &self,
        dst: &'a mut dyn Write,
        level: i32,
    ) -> Result<Box<dyn StreamEncoder + 'a>>;
    /// Decodes `src` into `dst` in blocks of at most `chunk_size` bytes and
    /// returns the decoded length.
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write, chunk_size: usize)
    -> Result<u64>;
}

pub(crate) fn copy_in_chunks(
    src: impl Read,
    dst: &mut dyn Write,
    chunk_size: usize,
) -> Result<u64> {
    let mut total = 0u64;
    for chunk in crate::util::chunks::ChunkSource::new(src, chunk_size) {
        let chunk = chunk?;
        dst.write_all(&chunk)?;
        total += chunk.len() as u64;
    }
    Ok(total)
}

pub mod gzip;
#[cfg(feature = "zstd")]
pub mod zstdc;

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(codec: Codec, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let c = codec.compressor().unwrap();
        let mut packed = Vec::new();
        {
            let mut enc = c.encoder(&mut packed, 3).unwrap();
            for part in data.chunks(1000) {
                enc.write_all(part).unwrap();
            }
            enc.finish().unwrap();
        }
        let mut unpacked = Vec::new();
        let n = c
            .decompress(&mut packed.as_slice(), &mut unpacked, 512)
            .unwrap();
        assert_eq!(n, unpacked.len() as u64);
        (packed, unpacked)
    }

    #[test]
    fn gzip_roundtrips_and_shrinks_text() {
        let data = b"lorem ipsum dolor sit amet ".repeat(2000);
        let (packed, unpacked) = roundtrip(Codec::Gzip, &data);
        assert!(packed.len() < data.len());
        assert_eq!(unpacked, data);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_roundtrips_and_shrinks_text() {
        let data = b"lorem ipsum dolor sit amet ".repeat(2000);
        let (packed, unpacked) = roundtrip(Codec::Zstd, &data);
        assert!(packed.len() < data.len());
        assert_eq!(unpacked, data);
    }

    #[test]
    fn empty_input_roundtrips() {
        let (_, unpacked) = roundtrip(Codec::detect(), &[]);
        assert!(unpacked.is_empty());
    }

    #[test]
    fn detected_codec_is_available() {
        let codec = Codec::detect();
        assert!(codec.is_available());
        assert_eq!(codec.compressor().unwrap().codec(), codec);
    }

    #[test]
    fn levels_are_clamped_per_codec() {
        assert_eq!(Codec::Zstd.clamp_level(0), 1);
        assert_eq!(Codec::Zstd.clamp_level(40), 22);
        assert_eq!(Codec::Gzip.clamp_level(12), 9);
        assert_eq!(Codec::Gzip.clamp_level(-3), 0);
    }

    #[test]
    fn corrupt_input_is_an_error() {
        let c = Codec::detect().compressor().unwrap();
        let mut out = Vec::new();
        let garbage = vec![0xA5u8; 256];
        assert!(c.decompress(&mut garbage.as_slice(), &mut out, 64).is_err());
    }
}
