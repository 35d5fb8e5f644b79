//! Random-access decompression of seekable archives.
//!
//! The decoder loads the seek table from the tail of the source, then
//! serves reads frame by frame: translate the decompressed cursor into a
//! frame index, pull exactly that frame's compressed bytes, decode them
//! with a fresh one-shot call and drain the residue into the caller's
//! buffer. Seeks reposition to a frame boundary and discard the intra-frame
//! prefix through the same read path.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::frame_codec::FrameDecompressor;
use crate::seek_table::{SeekTable, SEEK_TABLE_INTEGRITY_SIZE};
use crate::table_codec::{parse_integrity_size, parse_seek_table};

/// Default decompression window cap (128 MiB).
pub const DEFAULT_MAX_WINDOW_LOG: u32 = 27;

#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Use this table instead of parsing one from the source tail.
    pub seek_table: Option<SeekTable>,
    /// First visible frame.
    pub lower_frame: u32,
    /// Last visible frame; 0 means the last frame of the archive.
    pub upper_frame: u32,
    /// Decompression dictionary, may be empty.
    pub dict: Vec<u8>,
    /// Decompression window cap as a power of two; values below 10 are
    /// ignored. Use [`DecoderOptions::default`] for 128 MiB.
    pub max_window_log: u32,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            seek_table: None,
            lower_frame: 0,
            upper_frame: 0,
            dict: Vec::new(),
            max_window_log: DEFAULT_MAX_WINDOW_LOG,
        }
    }
}

/// Seekable zstd decoder over any random-access byte source.
pub struct Decoder<R: Read + Seek> {
    source: R,
    codec: FrameDecompressor,
    seek_table: SeekTable,
    current_frame: u32,
    lower_frame: u32,
    upper_frame: u32,
    buffer: Vec<u8>,
    buf_pos: usize,
    cursor: u64,
    eof: bool,
    frame_scratch: Vec<u8>,
}

impl<R: Read + Seek> Decoder<R> {
    /// Open a decoder over `source`. Unless overridden in `options`, the
    /// seek table is loaded from the source tail; failure to load one fails
    /// the constructor with [`Error::NoSeekTable`].
    pub fn new(mut source: R, options: DecoderOptions) -> Result<Self> {
        let seek_table = match options.seek_table {
            Some(table) => table,
            None => load_seek_table(&mut source).map_err(|_| Error::NoSeekTable)?,
        };
        let num_frames = seek_table.num_frames();

        let codec = FrameDecompressor::new(&options.dict, options.max_window_log)?;
        let lower_frame = options.lower_frame;
        let upper_frame = if num_frames == 0 {
            0
        } else if options.upper_frame == 0
            || options.upper_frame < lower_frame
            || options.upper_frame >= num_frames
        {
            num_frames - 1
        } else {
            options.upper_frame
        };

        let cursor = if lower_frame > 0 {
            seek_table.frame_start_decomp(lower_frame)?
        } else {
            0
        };
        if lower_frame > 0 {
            let start = seek_table.frame_start_comp(lower_frame)?;
            source.seek(SeekFrom::Start(start))?;
        } else {
            source.seek(SeekFrom::Start(0))?;
        }

        Ok(Self {
            source,
            codec,
            seek_table,
            current_frame: lower_frame,
            lower_frame,
            upper_frame,
            buffer: Vec::new(),
            buf_pos: 0,
            cursor,
            eof: false,
            frame_scratch: Vec::new(),
        })
    }

    /// Read decompressed bytes into `buf`, returning 0 at end of stream.
    /// The prefix, when given, is applied only to the first frame of the
    /// visible range: it is prepended to the compressed input and dropped
    /// again if that decode fails, so archives written without one still
    /// read correctly.
    pub fn read_with_prefix(&mut self, buf: &mut [u8], prefix: Option<&[u8]>) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        let mut total = 0;
        while total < buf.len() {
            if self.buf_pos < self.buffer.len() {
                let n = (self.buffer.len() - self.buf_pos).min(buf.len() - total);
                buf[total..total + n]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + n]);
                self.buf_pos += n;
                self.cursor += n as u64;
                total += n;
                continue;
            }
            if !self.decompress_next_frame(prefix)? {
                self.eof = true;
                break;
            }
        }
        Ok(total)
    }

    /// Move the decompressed cursor. `End` resolves against the archive's
    /// total decompressed size; targets before the start saturate to 0.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let num_frames = self.seek_table.num_frames();
        if num_frames == 0 {
            self.buffer.clear();
            self.buf_pos = 0;
            self.cursor = 0;
            return Ok(0);
        }

        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => self.cursor.saturating_add_signed(delta),
            SeekFrom::End(delta) => self
                .seek_table
                .frame_end_decomp(num_frames - 1)?
                .saturating_add_signed(delta),
        };

        let mut target_frame = self.seek_table.find_frame_at_decomp(target);
        if target_frame < self.lower_frame {
            target_frame = self.lower_frame;
        }
        if target_frame > self.upper_frame {
            target_frame = self.upper_frame;
        }

        let frame_start_comp = self.seek_table.frame_start_comp(target_frame)?;
        let frame_start_decomp = self.seek_table.frame_start_decomp(target_frame)?;
        self.source.seek(SeekFrom::Start(frame_start_comp))?;
        self.current_frame = target_frame;
        self.buffer.clear();
        self.buf_pos = 0;
        self.cursor = frame_start_decomp;
        self.eof = false;

        // Scroll forward through the decode pipeline to reach a mid-frame
        // target; stops early when the visible range ends first.
        if target > frame_start_decomp {
            let mut remaining = target - frame_start_decomp;
            let mut scratch = [0u8; 4096];
            while remaining > 0 {
                let want = remaining.min(scratch.len() as u64) as usize;
                let n = self.read_with_prefix(&mut scratch[..want], None)?;
                if n == 0 {
                    break;
                }
                remaining -= n as u64;
            }
        }
        Ok(self.cursor)
    }

    /// Restrict the visible range from below; clamps to the last frame.
    pub fn set_lower_frame(&mut self, frame: u32) {
        self.lower_frame = self.clamp_frame(frame);
        if self.current_frame < self.lower_frame {
            self.current_frame = self.lower_frame;
        }
    }

    /// Restrict the visible range from above; clamps to the last frame.
    pub fn set_upper_frame(&mut self, frame: u32) {
        self.upper_frame = self.clamp_frame(frame);
    }

    pub fn seek_table(&self) -> &SeekTable {
        &self.seek_table
    }

    fn clamp_frame(&self, frame: u32) -> u32 {
        match self.seek_table.num_frames() {
            0 => 0,
            n => frame.min(n - 1),
        }
    }

    /// Decode the next visible frame into the residue buffer. Returns false
    /// at end of stream.
    fn decompress_next_frame(&mut self, prefix: Option<&[u8]>) -> Result<bool> {
        if self.seek_table.num_frames() == 0 || self.current_frame > self.upper_frame {
            return Ok(false);
        }

        let compressed_size = self.seek_table.frame_size_comp(self.current_frame)?;
        let decompressed_size = self.seek_table.frame_size_decomp(self.current_frame)?;
        self.frame_scratch.resize(compressed_size as usize, 0);
        self.source.read_exact(&mut self.frame_scratch)?;

        let decoded = match prefix {
            Some(p) if !p.is_empty() && self.current_frame == self.lower_frame => {
                let mut combined = Vec::with_capacity(p.len() + self.frame_scratch.len());
                combined.extend_from_slice(p);
                combined.extend_from_slice(&self.frame_scratch);
                let capacity = decompressed_size as usize + p.len();
                match self.codec.decompress(&combined, capacity) {
                    Ok(bytes) => bytes,
                    Err(_) => self.codec.decompress(&self.frame_scratch, capacity)?,
                }
            }
            _ => self
                .codec
                .decompress(&self.frame_scratch, decompressed_size as usize)?,
        };
        self.buffer = decoded;
        self.buf_pos = 0;
        self.current_frame += 1;
        Ok(true)
    }
}

impl<R: Read + Seek> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_with_prefix(buf, None).map_err(std::io::Error::from)
    }
}

impl<R: Read + Seek> Seek for Decoder<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Decoder::seek(self, pos).map_err(std::io::Error::from)
    }
}

/// Load and parse the seek table from the tail of a source, restoring the
/// source position afterwards.
fn load_seek_table<R: Read + Seek>(source: &mut R) -> Result<SeekTable> {
    let original_pos = source.stream_position()?;

    let mut integrity = [0u8; SEEK_TABLE_INTEGRITY_SIZE];
    source.seek(SeekFrom::End(-(SEEK_TABLE_INTEGRITY_SIZE as i64)))?;
    source.read_exact(&mut integrity)?;
    let table_size = parse_integrity_size(&integrity)?;

    source.seek(SeekFrom::End(-(table_size as i64)))?;
    let mut data = vec![0u8; table_size as usize];
    source.read_exact(&mut data)?;
    let table = parse_seek_table(&data)?;

    source.seek(SeekFrom::Start(original_pos))?;
    Ok(table)
}
