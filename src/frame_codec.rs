//! One-frame-at-a-time zstd contexts.
//!
//! Random access requires every frame to be self-contained, so both wrappers
//! use the bulk (single-shot) zstd API: one call, one frame, no state carried
//! between frames.

use crate::error::{Error, Result};

/// Window logs below this are rejected by zstd and ignored here.
pub const MIN_WINDOW_LOG: u32 = 10;

/// Compresses byte buffers into independent zstd frames.
pub struct FrameCompressor {
    ctx: zstd::bulk::Compressor<'static>,
}

impl FrameCompressor {
    pub fn new(level: i32, checksum_flag: bool, dict: &[u8]) -> Result<Self> {
        let mut ctx = if dict.is_empty() {
            zstd::bulk::Compressor::new(level)
        } else {
            zstd::bulk::Compressor::with_dictionary(level, dict)
        }
        .map_err(Error::Codec)?;
        ctx.include_checksum(checksum_flag).map_err(Error::Codec)?;
        Ok(Self { ctx })
    }

    /// Compress `data` into exactly one self-contained frame.
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.ctx.compress(data).map_err(Error::Codec)
    }
}

/// Decompresses independent zstd frames.
pub struct FrameDecompressor {
    ctx: zstd::bulk::Decompressor<'static>,
}

impl FrameDecompressor {
    pub fn new(dict: &[u8], max_window_log: u32) -> Result<Self> {
        let mut ctx = if dict.is_empty() {
            zstd::bulk::Decompressor::new()
        } else {
            zstd::bulk::Decompressor::with_dictionary(dict)
        }
        .map_err(Error::Codec)?;
        if max_window_log >= MIN_WINDOW_LOG {
            ctx.window_log_max(max_window_log).map_err(Error::Codec)?;
        }
        Ok(Self { ctx })
    }

    /// Decompress one frame (or a concatenation of frames) into at most
    /// `capacity` bytes.
    pub fn decompress(&mut self, data: &[u8], capacity: usize) -> Result<Vec<u8>> {
        self.ctx.decompress(data, capacity).map_err(Error::Codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let mut compressor = FrameCompressor::new(3, true, &[]).unwrap();
        let mut decompressor = FrameDecompressor::new(&[], 27).unwrap();
        let data = b"a moderately repetitive payload payload payload payload";
        let frame = compressor.compress(data).unwrap();
        let back = decompressor.decompress(&frame, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn each_call_yields_an_independent_frame() {
        let mut compressor = FrameCompressor::new(3, false, &[]).unwrap();
        let mut decompressor = FrameDecompressor::new(&[], 0).unwrap();
        let first = compressor.compress(b"first").unwrap();
        let second = compressor.compress(b"second").unwrap();
        assert_eq!(decompressor.decompress(&first, 5).unwrap(), b"first");
        assert_eq!(decompressor.decompress(&second, 6).unwrap(), b"second");
    }

    #[test]
    fn dictionary_round_trip() {
        // A raw content-only dictionary is enough to prime the window.
        let dict = vec![0x20; 1024];
        let mut compressor = FrameCompressor::new(3, false, &dict).unwrap();
        let mut decompressor = FrameDecompressor::new(&dict, 27).unwrap();
        let data = vec![0x20; 4096];
        let frame = compressor.compress(&data).unwrap();
        let back = decompressor.decompress(&frame, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn garbage_fails_to_decompress() {
        let mut decompressor = FrameDecompressor::new(&[], 27).unwrap();
        assert!(matches!(
            decompressor.decompress(b"not a zstd frame", 64),
            Err(Error::Codec(_))
        ));
    }
}
