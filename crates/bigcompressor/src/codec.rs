//! Block compressors wrapped around each chunk's archive stream
//!
//! Chunks carry no codec tag of their own; the decoder recognises the
//! codec from the stream's leading bytes.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// LZ4 frame magic number (0x184D2204, little-endian)
pub const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Compression codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// LZ4 frame format
    #[default]
    Lz4,
    /// `ZLib` (deflate with zlib header)
    Zlib,
}

impl Codec {
    /// Identify the codec of a compressed chunk from its leading bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&LZ4_FRAME_MAGIC) {
            return Some(Self::Lz4);
        }

        // CMF/FLG pair: deflate method, window <= 32K, FCHECK multiple of 31
        if let [cmf, flg, ..] = *data {
            let header = (u16::from(cmf) << 8) | u16::from(flg);
            if cmf & 0x0F == 8 && cmf >> 4 <= 7 && header % 31 == 0 {
                return Some(Self::Zlib);
            }
        }

        None
    }

    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Zlib => "zlib",
        }
    }
}

/// Streaming compressor writing into `W`
///
/// A new writer is built for every chunk. `lz4_flex`'s `FrameEncoder` has no
/// reset and each chunk must be a complete, independent frame, so only the
/// output buffer is carried across chunks. The zlib path follows the same
/// lifecycle even though `flate2` offers `reset`.
pub(crate) enum CodecWriter<W: Write> {
    Lz4(FrameEncoder<W>),
    Zlib(ZlibEncoder<W>),
}

impl<W: Write> CodecWriter<W> {
    pub(crate) fn new(codec: Codec, inner: W) -> Self {
        match codec {
            Codec::Lz4 => Self::Lz4(FrameEncoder::new(inner)),
            Codec::Zlib => Self::Zlib(ZlibEncoder::new(inner, Compression::default())),
        }
    }

    /// Flush all pending compressed output and return the inner writer
    pub(crate) fn finish(self) -> io::Result<W> {
        match self {
            Self::Lz4(encoder) => encoder.finish().map_err(io::Error::other),
            Self::Zlib(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for CodecWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Lz4(encoder) => encoder.write(buf),
            Self::Zlib(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Lz4(encoder) => encoder.flush(),
            Self::Zlib(encoder) => encoder.flush(),
        }
    }
}

/// Streaming decompressor reading from `R`
///
/// Built per chunk like [`CodecWriter`], since the codec is sniffed per chunk.
pub(crate) enum CodecReader<R: Read> {
    Lz4(FrameDecoder<R>),
    Zlib(ZlibDecoder<R>),
}

impl<R: Read> CodecReader<R> {
    pub(crate) fn new(codec: Codec, inner: R) -> Self {
        match codec {
            Codec::Lz4 => Self::Lz4(FrameDecoder::new(inner)),
            Codec::Zlib => Self::Zlib(ZlibDecoder::new(inner)),
        }
    }
}

impl<R: Read> Read for CodecReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Lz4(decoder) => decoder.read(buf),
            Self::Zlib(decoder) => decoder.read(buf),
        }
    }
}
