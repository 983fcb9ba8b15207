//! Variable-width block-size table.
//!
//! Each entry records the on-disk (compressed) size of one block. The width
//! of each entry is derived once from the archive's `block_size`, so the
//! table itself carries no per-entry width tag.

use crate::error::{PsarcError, Result};

/// Picks the table's entry width from the header's `block_size`.
///
/// A `block_size` up to 0x100 needs 1 byte per entry (each entry can record
/// every size from 0 up to and including a full block), up to 0x1_0000 needs
/// 2, up to 0x100_0000 needs 3, and anything larger needs 4. `block_size == 0`
/// is never valid.
pub fn block_table_width(block_size: u32) -> Result<u8> {
    match block_size {
        0 => Err(PsarcError::BadBlockSize(0)),
        1..=0x100 => Ok(1),
        0x101..=0x1_0000 => Ok(2),
        0x1_0001..=0x100_0000 => Ok(3),
        _ => Ok(4),
    }
}

/// Encodes `sizes` (one compressed length per block) into a byte table of
/// the given `width`.
///
/// A compressed length equal to `block_size` is written as `0`: the
/// convention freeing up the top of the entry's range to mean "this block's
/// compressed payload fills a whole `block_size`," since the format has no
/// other way to write a value one past an N-byte field's maximum.
pub fn encode_block_table(sizes: &[u32], block_size: u32, width: u8) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(sizes.len() * width as usize);
    for &size in sizes {
        let stored = if size == block_size { 0 } else { size };
        let bytes = stored.to_be_bytes();
        out.extend_from_slice(&bytes[4 - width as usize..]);
    }
    Ok(out)
}

/// Decodes a block-size table, expanding stored `0` entries back into a full
/// `block_size`.
pub fn decode_block_table(src: &[u8], block_size: u32, width: u8, count: usize) -> Result<Vec<u32>> {
    let width = width as usize;
    let needed = count * width;
    if src.len() < needed {
        return Err(PsarcError::Truncated {
            needed,
            available: src.len(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for chunk in src[..needed].chunks_exact(width) {
        let mut bytes = [0u8; 4];
        bytes[4 - width..].copy_from_slice(chunk);
        let stored = u32::from_be_bytes(bytes);
        out.push(if stored == 0 { block_size } else { stored });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_selection_matches_ranges() {
        assert_eq!(block_table_width(1).unwrap(), 1);
        assert_eq!(block_table_width(0x100).unwrap(), 1);
        assert_eq!(block_table_width(0x101).unwrap(), 2);
        assert_eq!(block_table_width(0x1_0000).unwrap(), 2);
        assert_eq!(block_table_width(0x1_0001).unwrap(), 3);
        assert_eq!(block_table_width(0x100_0000).unwrap(), 3);
        assert_eq!(block_table_width(0x100_0001).unwrap(), 4);
        assert_eq!(block_table_width(0xFFFF_FFFF).unwrap(), 4);
    }

    #[test]
    fn rejects_zero_block_size() {
        assert!(matches!(
            block_table_width(0),
            Err(PsarcError::BadBlockSize(0))
        ));
    }

    #[test]
    fn full_block_round_trips_as_zero() {
        let block_size = 65536u32;
        let width = block_table_width(block_size).unwrap();
        let sizes = [65536u32, 100, 0, 65536];
        let encoded = encode_block_table(&sizes, block_size, width).unwrap();
        assert_eq!(encoded.len(), sizes.len() * width as usize);
        // the full-block entries must be stored as zero
        assert_eq!(&encoded[0..2], &[0, 0]);

        let decoded = decode_block_table(&encoded, block_size, width, sizes.len()).unwrap();
        assert_eq!(decoded, vec![65536, 100, 0x10000, 65536]);
    }

    #[test]
    fn empty_block_is_indistinguishable_from_full_block_in_general_but_zero_never_occurs_in_practice() {
        // An entry genuinely compressing to 0 bytes never happens (every
        // block carries at least the codec's own framing), so the stored-0
        // convention has no ambiguous case in practice.
        let block_size = 256u32;
        let width = block_table_width(block_size).unwrap();
        let encoded = encode_block_table(&[block_size], block_size, width).unwrap();
        let decoded = decode_block_table(&encoded, block_size, width, 1).unwrap();
        assert_eq!(decoded, vec![block_size]);
    }

    #[test]
    fn rejects_truncated_table() {
        let err = decode_block_table(&[0u8; 2], 65536, 2, 2);
        assert!(matches!(err, Err(PsarcError::Truncated { .. })));
    }
}
