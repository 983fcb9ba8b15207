//! Fixed 30-byte TOC entries.

use crate::byteorder;
use crate::error::Result;
use crate::md5::DigestBytes;

/// Fixed-size TOC entry, as described in the data model's `TocEntry` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub name_digest: DigestBytes,
    /// Index of this entry's first block in the block table.
    pub block_offset: u32,
    /// 40-bit field: uncompressed size of the entry.
    pub uncompressed_size: u64,
    /// 40-bit field: byte offset into the archive of the entry's first
    /// compressed block, measured from the start of the file.
    pub file_offset: u64,
}

/// Size of one encoded [`TocEntry`] — matches [`crate::format::TOC_ENTRY_SIZE`].
pub const ENTRY_SIZE: usize = 30;

impl TocEntry {
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..16].copy_from_slice(&self.name_digest);
        byteorder::write_u32(&mut buf[16..20], self.block_offset);
        byteorder::write_u40(&mut buf[20..25], self.uncompressed_size);
        byteorder::write_u40(&mut buf[25..30], self.file_offset);
        buf
    }

    pub fn decode(src: &[u8]) -> Result<Self> {
        let mut name_digest = [0u8; 16];
        name_digest.copy_from_slice(&src[0..16]);
        let block_offset = byteorder::read_u32(&src[16..20])?;
        let uncompressed_size = byteorder::read_u40(&src[20..25])?;
        let file_offset = byteorder::read_u40(&src[25..30])?;
        Ok(TocEntry {
            name_digest,
            block_offset,
            uncompressed_size,
            file_offset,
        })
    }
}
