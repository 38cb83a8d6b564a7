use super::{Codec, Compressor, StreamEncoder, copy_in_chunks};
use crate::error::Result;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

pub struct GzipCompressor;

impl<W: Write> StreamEncoder for GzEncoder<W> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        GzEncoder::finish(*self).map(|_| ())
    }
}

impl Compressor for GzipCompressor {
    fn codec(&self) -> Codec {
        Codec::Gzip
    }

    fn encoder<'a>(
        &self,
        dst: &'a mut dyn Write,
        level: i32,
    ) -> Result<Box<dyn StreamEncoder + 'a>> {
        let level = Codec::Gzip.clamp_level(level) as u32;
        Ok(Box::new(GzEncoder::new(dst, Compression::new(level))))
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write, chunk_size: usize) -> Result<u64> {
        copy_in_chunks(MultiGzDecoder::new(src), dst, chunk_size)
    }
}
