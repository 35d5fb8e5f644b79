//! On-disk layout of the seek table.
//!
//! The whole table rides inside one zstd skippable frame so that plain zstd
//! decoders pass over it: `[skippable magic][content size]` followed by the
//! 17-byte frame slots and a 9-byte integrity field. The integrity field
//! sits after the slots in `Foot` position (the wire standard) or before
//! them in `Head` position.

use crate::error::{Error, Result};
use crate::seek_table::{
    SeekTable, SEEKABLE_MAGIC_NUMBER, SEEKABLE_MAX_FRAMES, SEEK_TABLE_INTEGRITY_SIZE,
    SIZE_PER_FRAME, SKIPPABLE_HEADER_SIZE, SKIPPABLE_MAGIC_NUMBER,
};

/// Placement of the integrity field inside the skippable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Integrity field after the frame slots. The wire standard.
    #[default]
    Foot,
    /// Integrity field before the frame slots.
    Head,
}

/// Pull-style serializer over a frozen [`SeekTable`].
///
/// Tracks a single cursor over the logical encoded stream and fills caller
/// buffers span by span, so even a maximal table (2^27 frames, ~2.3 GiB of
/// slots) never needs a contiguous image. Call [`write_to`](Self::write_to)
/// until it returns 0.
pub struct Serializer<'a> {
    table: &'a SeekTable,
    format: Format,
    write_pos: u64,
}

impl<'a> Serializer<'a> {
    pub fn new(table: &'a SeekTable, format: Format) -> Self {
        Self {
            table,
            format,
            write_pos: 0,
        }
    }

    /// Total size of the encoded table.
    pub fn encoded_len(&self) -> u64 {
        (SKIPPABLE_HEADER_SIZE + SEEK_TABLE_INTEGRITY_SIZE) as u64
            + self.table.num_frames() as u64 * SIZE_PER_FRAME as u64
    }

    /// Fill `buf` with the next bytes of the encoded table. Returns the
    /// number of bytes produced, 0 once the table is fully written.
    pub fn write_to(&mut self, buf: &mut [u8]) -> usize {
        let total = self.encoded_len();
        let mut written = 0;
        while written < buf.len() && self.write_pos < total {
            let mut span = [0u8; SIZE_PER_FRAME];
            let (span_start, span_len) = self.fill_span_at(self.write_pos, &mut span);
            let span_off = (self.write_pos - span_start) as usize;
            let n = (span_len - span_off).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&span[span_off..span_off + n]);
            written += n;
            self.write_pos += n as u64;
        }
        written
    }

    /// Produce the span (envelope, integrity, or one slot) covering `pos`.
    /// Returns the span's start offset in the logical stream and its length.
    fn fill_span_at(&self, pos: u64, span: &mut [u8; SIZE_PER_FRAME]) -> (u64, usize) {
        let num_frames = self.table.num_frames() as u64;
        let slots_len = num_frames * SIZE_PER_FRAME as u64;
        let slots_start = match self.format {
            Format::Foot => SKIPPABLE_HEADER_SIZE as u64,
            Format::Head => (SKIPPABLE_HEADER_SIZE + SEEK_TABLE_INTEGRITY_SIZE) as u64,
        };

        if pos < SKIPPABLE_HEADER_SIZE as u64 {
            let content_size =
                (SEEK_TABLE_INTEGRITY_SIZE as u64 + slots_len) as u32;
            span[0..4].copy_from_slice(&SKIPPABLE_MAGIC_NUMBER.to_le_bytes());
            span[4..8].copy_from_slice(&content_size.to_le_bytes());
            return (0, SKIPPABLE_HEADER_SIZE);
        }
        if pos < slots_start || pos >= slots_start + slots_len {
            let integrity_start = if pos < slots_start {
                SKIPPABLE_HEADER_SIZE as u64
            } else {
                slots_start + slots_len
            };
            span[0..4].copy_from_slice(&self.table.num_frames().to_le_bytes());
            span[4] = 0;
            span[5..9].copy_from_slice(&SEEKABLE_MAGIC_NUMBER.to_le_bytes());
            return (integrity_start, SEEK_TABLE_INTEGRITY_SIZE);
        }

        let index = (pos - slots_start) / SIZE_PER_FRAME as u64;
        let (compressed_size, decompressed_size) = self.table.frame_sizes(index as u32);
        span[0..4].copy_from_slice(&compressed_size.to_le_bytes());
        span[4..8].copy_from_slice(&decompressed_size.to_le_bytes());
        span[8] = 0;
        (
            slots_start + index * SIZE_PER_FRAME as u64,
            SIZE_PER_FRAME,
        )
    }
}

/// Parse a complete serialized seek table, accepting both integrity
/// placements.
pub fn parse_seek_table(data: &[u8]) -> Result<SeekTable> {
    if data.len() < SEEK_TABLE_INTEGRITY_SIZE {
        return Err(Error::Corrupted("shorter than integrity field"));
    }
    let integrity = &data[data.len() - SEEK_TABLE_INTEGRITY_SIZE..];
    let num_frames = parse_integrity(integrity)?;

    let expected = (SKIPPABLE_HEADER_SIZE + SEEK_TABLE_INTEGRITY_SIZE) as u64
        + num_frames as u64 * SIZE_PER_FRAME as u64;
    if data.len() as u64 != expected {
        return Err(Error::Corrupted("length does not match frame count"));
    }
    if read_u32(data, 0) != SKIPPABLE_MAGIC_NUMBER {
        return Err(Error::InvalidMagic("skippable frame"));
    }

    // A seekable magic right after the envelope means the integrity field
    // leads the slots (Head placement).
    let mut slots_start = SKIPPABLE_HEADER_SIZE;
    if data.len() > SKIPPABLE_HEADER_SIZE + SEEK_TABLE_INTEGRITY_SIZE
        && read_u32(data, SKIPPABLE_HEADER_SIZE + 5) == SEEKABLE_MAGIC_NUMBER
    {
        slots_start += SEEK_TABLE_INTEGRITY_SIZE;
    }

    let mut table = SeekTable::new();
    for i in 0..num_frames as usize {
        let offset = slots_start + i * SIZE_PER_FRAME;
        let compressed_size = read_u32(data, offset);
        let decompressed_size = read_u32(data, offset + 4);
        table.log_frame(compressed_size, decompressed_size)?;
    }
    Ok(table)
}

/// Total on-disk size of a seek table, read from its 9-byte integrity field
/// alone. Lets a reader compute how far back from the end to seek.
pub fn parse_integrity_size(integrity: &[u8]) -> Result<u64> {
    if integrity.len() != SEEK_TABLE_INTEGRITY_SIZE {
        return Err(Error::Corrupted("integrity field must be 9 bytes"));
    }
    let num_frames = parse_integrity(integrity)?;
    Ok((SKIPPABLE_HEADER_SIZE + SEEK_TABLE_INTEGRITY_SIZE) as u64
        + num_frames as u64 * SIZE_PER_FRAME as u64)
}

fn parse_integrity(integrity: &[u8]) -> Result<u32> {
    if read_u32(integrity, 5) != SEEKABLE_MAGIC_NUMBER {
        return Err(Error::InvalidMagic("seekable integrity field"));
    }
    let num_frames = read_u32(integrity, 0);
    if num_frames > SEEKABLE_MAX_FRAMES {
        return Err(Error::FrameIndexTooLarge);
    }
    Ok(num_frames)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().expect("slice length"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SeekTable {
        let mut table = SeekTable::new();
        table.log_frame(120, 512).unwrap();
        table.log_frame(80, 512).unwrap();
        table.log_frame(33, 100).unwrap();
        table
    }

    fn serialize(table: &SeekTable, format: Format) -> Vec<u8> {
        let mut serializer = Serializer::new(table, format);
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = serializer.write_to(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn encoded_len_matches_formula() {
        let table = sample_table();
        let serializer = Serializer::new(&table, Format::Foot);
        assert_eq!(serializer.encoded_len(), 8 + 9 + 17 * 3);
        assert_eq!(serialize(&table, Format::Foot).len() as u64, 8 + 9 + 17 * 3);
        assert_eq!(serialize(&table, Format::Head).len() as u64, 8 + 9 + 17 * 3);
    }

    #[test]
    fn round_trip_foot_format() {
        let table = sample_table();
        let parsed = parse_seek_table(&serialize(&table, Format::Foot)).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn round_trip_head_format() {
        let table = sample_table();
        let parsed = parse_seek_table(&serialize(&table, Format::Head)).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn round_trip_empty_table() {
        let table = SeekTable::new();
        let bytes = serialize(&table, Format::Foot);
        assert_eq!(bytes.len(), 17);
        let parsed = parse_seek_table(&bytes).unwrap();
        assert_eq!(parsed.num_frames(), 0);
    }

    #[test]
    fn chunked_output_is_identical_for_any_scratch_size() {
        let table = sample_table();
        let reference = serialize(&table, Format::Foot);
        for scratch_size in [1usize, 2, 3, 5, 8, 13, 17, 26, 64, 4096] {
            let mut serializer = Serializer::new(&table, Format::Foot);
            let mut out = Vec::new();
            let mut buf = vec![0u8; scratch_size];
            loop {
                let n = serializer.write_to(&mut buf);
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
            assert_eq!(out, reference, "scratch size {scratch_size}");
        }
    }

    #[test]
    fn wire_layout_is_byte_exact() {
        let mut table = SeekTable::new();
        table.log_frame(0x0102_0304, 0x0a0b_0c0d).unwrap();
        let bytes = serialize(&table, Format::Foot);

        assert_eq!(&bytes[0..4], &SKIPPABLE_MAGIC_NUMBER.to_le_bytes());
        // Envelope content size covers the integrity field plus one slot.
        assert_eq!(&bytes[4..8], &(9u32 + 17).to_le_bytes());
        assert_eq!(&bytes[8..12], &0x0102_0304u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0x0a0b_0c0du32.to_le_bytes());
        assert_eq!(bytes[16], 0);
        assert_eq!(&bytes[17..21], &1u32.to_le_bytes());
        assert_eq!(bytes[21], 0);
        assert_eq!(&bytes[22..26], &SEEKABLE_MAGIC_NUMBER.to_le_bytes());
    }

    #[test]
    fn parse_rejects_short_input() {
        assert!(matches!(
            parse_seek_table(&[0u8; 5]),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_seekable_magic() {
        let mut bytes = [0u8; 9];
        bytes[5..9].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        assert!(matches!(
            parse_seek_table(&bytes),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn parse_rejects_excessive_frame_count() {
        let mut bytes = [0u8; 9];
        bytes[0..4].copy_from_slice(&(SEEKABLE_MAX_FRAMES + 1).to_le_bytes());
        bytes[5..9].copy_from_slice(&SEEKABLE_MAGIC_NUMBER.to_le_bytes());
        assert!(matches!(
            parse_seek_table(&bytes),
            Err(Error::FrameIndexTooLarge)
        ));
        assert!(matches!(
            parse_integrity_size(&bytes),
            Err(Error::FrameIndexTooLarge)
        ));
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        let table = sample_table();
        let mut bytes = serialize(&table, Format::Foot);
        // Dropping a slot byte keeps the trailing integrity field intact but
        // breaks the declared length.
        bytes.remove(8);
        assert!(matches!(
            parse_seek_table(&bytes),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_skippable_magic() {
        let table = sample_table();
        let mut bytes = serialize(&table, Format::Foot);
        bytes[0] ^= 0xff;
        assert!(matches!(
            parse_seek_table(&bytes),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn integrity_size_round_trips() {
        let table = sample_table();
        let bytes = serialize(&table, Format::Foot);
        let integrity = &bytes[bytes.len() - 9..];
        assert_eq!(parse_integrity_size(integrity).unwrap(), bytes.len() as u64);
    }
}
