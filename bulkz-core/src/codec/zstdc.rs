use super::{Codec, Compressor, StreamEncoder, copy_in_chunks};
use crate::error::Result;
use std::io::{Read, Write};
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

pub struct ZstdCompressor;

impl<W: Write> StreamEncoder for Encoder<'static, W> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        Encoder::finish(*self).map(|_| ())
    }
}

impl Compressor for ZstdCompressor {
    fn codec(&self) -> Codec {
        Codec::Zstd
    }

    fn encoder<'a>(
        &self,
        dst: &'a mut dyn Write,
        level: i32,
    ) -> Result<Box<dyn StreamEncoder + 'a>> {
        // Single-threaded per stream: parallelism lives at the file level.
        let enc = Encoder::new(dst, Codec::Zstd.clamp_level(level))?;
        Ok(Box::new(enc))
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write, chunk_size: usize) -> Result<u64> {
        let dec = Decoder::new(src)?;
        copy_in_chunks(dec, dst, chunk_size)
    }
}
