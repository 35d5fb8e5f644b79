//! Seekable zstd archives: independent frames plus a tail index that turns
//! a compressed stream into a randomly addressable one.
//!
//! An archive is a plain concatenation of zstd frames followed by a seek
//! table carried in a skippable frame, so any conformant zstd decoder still
//! reads the whole stream start to end. The seek table maps decompressed
//! offsets to frame boundaries, which is what lets [`Decoder`] jump to an
//! arbitrary byte without touching the rest of the file.
//!
//! ```rust,ignore
//! use std::io::{Read, Seek, SeekFrom};
//! use seekzstd::{Decoder, DecoderOptions, Encoder, EncoderOptions};
//!
//! let mut archive = Vec::new();
//! let mut encoder = Encoder::new(&mut archive, EncoderOptions::default())?;
//! std::io::copy(&mut input, &mut encoder)?;
//! encoder.finish()?;
//!
//! let mut decoder = Decoder::new(std::io::Cursor::new(archive), DecoderOptions::default())?;
//! decoder.seek(SeekFrom::Start(1 << 20))?;
//! decoder.read_exact(&mut buf)?;
//! ```

pub mod cli;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame_codec;
pub mod seek_table;
pub mod table_codec;

pub use decoder::{Decoder, DecoderOptions, DEFAULT_MAX_WINDOW_LOG};
pub use encoder::{
    Encoder, EncoderOptions, FrameSizePolicy, DEFAULT_COMPRESSION_LEVEL, DEFAULT_FRAME_SIZE,
    MAX_FRAME_SIZE,
};
pub use error::{Error, Result};
pub use frame_codec::{FrameCompressor, FrameDecompressor};
pub use seek_table::{
    SeekTable, SEEKABLE_MAGIC_NUMBER, SEEKABLE_MAX_FRAMES, SEEK_TABLE_INTEGRITY_SIZE,
    SIZE_PER_FRAME, SKIPPABLE_HEADER_SIZE, SKIPPABLE_MAGIC_NUMBER,
};
pub use table_codec::{parse_integrity_size, parse_seek_table, Format, Serializer};
