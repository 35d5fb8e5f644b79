//! Streaming seekable compression.
//!
//! The encoder partitions its input into independent zstd frames under a
//! [`FrameSizePolicy`], appends each finished frame to the underlying writer
//! and records it in the seek table. [`finish`](Encoder::finish) writes the
//! serialized table after the last frame.

use std::io::Write;

use crate::error::Result;
use crate::frame_codec::FrameCompressor;
use crate::seek_table::SeekTable;
use crate::table_codec::{Format, Serializer};

/// Hard cap on the decompressed size of a single frame.
pub const MAX_FRAME_SIZE: u64 = 1 << 32;
/// Default frame size threshold.
pub const DEFAULT_FRAME_SIZE: u32 = 512 * 1024;
/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// When to close the current frame and start the next one.
///
/// `Compressed` trades seek latency for ratio; `Uncompressed` gives a
/// predictable upper bound on the bytes a mid-frame seek must discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSizePolicy {
    /// Close the frame once it holds at least `size` compressed bytes.
    Compressed { size: u32 },
    /// Close the frame once it holds `min(size, 2^32)` decompressed bytes.
    Uncompressed { size: u32 },
}

impl Default for FrameSizePolicy {
    fn default() -> Self {
        FrameSizePolicy::Compressed {
            size: DEFAULT_FRAME_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub level: i32,
    pub frame_policy: FrameSizePolicy,
    pub checksum_flag: bool,
    pub compression_dict: Vec<u8>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_COMPRESSION_LEVEL,
            frame_policy: FrameSizePolicy::default(),
            checksum_flag: true,
            compression_dict: Vec::new(),
        }
    }
}

/// Seekable zstd encoder over any byte sink.
///
/// The writer's lifecycle belongs to the caller; the encoder never closes
/// it. Call [`finish`](Self::finish) exactly once after the last write.
pub struct Encoder<W: Write> {
    writer: W,
    codec: FrameCompressor,
    frame_policy: FrameSizePolicy,
    seek_table: SeekTable,
    frame_buffer: Vec<u8>,
    frame_c_size: u64,
    frame_d_size: u64,
    written_total: u64,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W, options: EncoderOptions) -> Result<Self> {
        let codec = FrameCompressor::new(
            options.level,
            options.checksum_flag,
            &options.compression_dict,
        )?;
        Ok(Self {
            writer,
            codec,
            frame_policy: options.frame_policy,
            seek_table: SeekTable::new(),
            frame_buffer: Vec::new(),
            frame_c_size: 0,
            frame_d_size: 0,
            written_total: 0,
        })
    }

    /// Stream `data` into the archive, closing frames as the policy
    /// dictates. With a prefix, the first chunk of the current frame is
    /// compressed as `prefix ‖ chunk` while only the chunk counts toward
    /// the decompressed size.
    pub fn write_with_prefix(&mut self, mut data: &[u8], prefix: Option<&[u8]>) -> Result<usize> {
        let mut accepted = 0;
        while !data.is_empty() {
            let mut remaining = self.remaining_frame_size();
            if remaining == 0 {
                self.end_frame()?;
                remaining = self.remaining_frame_size();
            }
            let take = remaining.min(data.len() as u64) as usize;
            let chunk = &data[..take];

            let compressed = match prefix {
                Some(p) if !p.is_empty() && self.frame_d_size == 0 => {
                    let mut combined = Vec::with_capacity(p.len() + chunk.len());
                    combined.extend_from_slice(p);
                    combined.extend_from_slice(chunk);
                    self.codec.compress(&combined)?
                }
                _ => self.codec.compress(chunk)?,
            };
            self.frame_buffer.extend_from_slice(&compressed);
            self.frame_c_size += compressed.len() as u64;
            self.frame_d_size += take as u64;
            accepted += take;
            data = &data[take..];

            if self.frame_complete() {
                self.end_frame()?;
            }
        }
        Ok(accepted)
    }

    /// Close the open frame: flush its compressed bytes to the writer and
    /// record it in the seek table. A no-op when the frame is empty, so an
    /// extra call before [`finish`](Self::finish) is harmless.
    pub fn end_frame(&mut self) -> Result<()> {
        if self.frame_d_size == 0 {
            return Ok(());
        }
        self.writer.write_all(&self.frame_buffer)?;
        self.seek_table
            .log_frame(self.frame_c_size as u32, self.frame_d_size as u32)?;
        self.written_total += self.frame_c_size;
        self.frame_buffer.clear();
        self.frame_c_size = 0;
        self.frame_d_size = 0;
        Ok(())
    }

    /// Flush the current frame and append the seek table in the standard
    /// `Foot` placement.
    pub fn finish(&mut self) -> Result<()> {
        self.finish_with_format(Format::Foot)
    }

    /// Flush the current frame and append the seek table in the chosen
    /// placement.
    pub fn finish_with_format(&mut self, format: Format) -> Result<()> {
        self.end_frame()?;
        let mut serializer = Serializer::new(&self.seek_table, format);
        let mut buf = [0u8; 4096];
        loop {
            let n = serializer.write_to(&mut buf);
            if n == 0 {
                break;
            }
            self.writer.write_all(&buf[..n])?;
        }
        Ok(())
    }

    pub fn seek_table(&self) -> &SeekTable {
        &self.seek_table
    }

    /// Total compressed bytes flushed so far, excluding the seek table.
    pub fn written_compressed(&self) -> u64 {
        self.written_total
    }

    fn remaining_frame_size(&self) -> u64 {
        // A zero threshold is treated as 1 so every frame accepts at least
        // one byte and the write loop always makes progress.
        match self.frame_policy {
            FrameSizePolicy::Compressed { size } => {
                let remaining = (size as u64).max(1).saturating_sub(self.frame_c_size);
                // The decompressed side of a frame must stay below 2^32 so
                // its size always fits the 32-bit seek table slot.
                remaining.min((MAX_FRAME_SIZE - 1).saturating_sub(self.frame_d_size))
            }
            FrameSizePolicy::Uncompressed { size } => (size as u64)
                .max(1)
                .min(MAX_FRAME_SIZE)
                .saturating_sub(self.frame_d_size),
        }
    }

    fn frame_complete(&self) -> bool {
        match self.frame_policy {
            FrameSizePolicy::Compressed { size } => {
                self.frame_c_size >= (size as u64).max(1)
                    || self.frame_d_size >= MAX_FRAME_SIZE - 1
            }
            FrameSizePolicy::Uncompressed { size } => {
                self.frame_d_size >= (size as u64).max(1).min(MAX_FRAME_SIZE)
            }
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_with_prefix(buf, None).map_err(std::io::Error::from)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
