//! The 32-byte PSARC archive header.

use crate::byteorder;
use crate::error::{PsarcError, Result};
use crate::format::{HEADER_SIZE, MAGIC, TOC_ENTRY_SIZE};

/// Bit 0 of `archive_flags`.
pub const FLAG_IGNORE_CASE: u32 = 1 << 0;
/// Bit 1 of `archive_flags`.
pub const FLAG_ABSOLUTE_PATHS: u32 = 1 << 1;

/// The fixed 32-byte archive header, described in the data model's
/// `ArchiveHeader` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub version_major: u16,
    pub version_minor: u16,
    /// 4 ASCII bytes: `"zlib"` or `"lzma"`.
    pub compression_tag: [u8; 4],
    /// Total bytes from the start of the file to the end of the block table.
    pub toc_length: u32,
    /// Always 30.
    pub toc_entry_size: u32,
    /// Includes the manifest entry.
    pub toc_entries: u32,
    pub block_size: u32,
    pub archive_flags: u32,
}

impl ArchiveHeader {
    /// Builds a header with the conventional defaults (version 1.4,
    /// `toc_entry_size = 30`) for a freshly created archive. `toc_length` and
    /// `toc_entries` are filled in once the TOC is known.
    pub fn new(compression_tag: [u8; 4], block_size: u32, archive_flags: u32) -> Self {
        ArchiveHeader {
            version_major: 1,
            version_minor: 4,
            compression_tag,
            toc_length: 0,
            toc_entry_size: TOC_ENTRY_SIZE,
            toc_entries: 0,
            block_size,
            archive_flags,
        }
    }

    pub fn ignore_case(&self) -> bool {
        self.archive_flags & FLAG_IGNORE_CASE != 0
    }

    pub fn absolute_paths(&self) -> bool {
        self.archive_flags & FLAG_ABSOLUTE_PATHS != 0
    }

    /// Encodes the header into exactly [`HEADER_SIZE`] bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        byteorder::write_u16(&mut buf[4..6], self.version_major);
        byteorder::write_u16(&mut buf[6..8], self.version_minor);
        buf[8..12].copy_from_slice(&self.compression_tag);
        byteorder::write_u32(&mut buf[12..16], self.toc_length);
        byteorder::write_u32(&mut buf[16..20], self.toc_entry_size);
        byteorder::write_u32(&mut buf[20..24], self.toc_entries);
        byteorder::write_u32(&mut buf[24..28], self.block_size);
        byteorder::write_u32(&mut buf[28..32], self.archive_flags);
        buf
    }

    /// Decodes and validates a header from `src`. Validates magic and
    /// `toc_entry_size` up front; callers validate `block_size` separately
    /// via [`crate::format::block_table_width`] since the valid range
    /// depends on how the table width is to be used.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(PsarcError::Truncated {
                needed: HEADER_SIZE,
                available: src.len(),
            });
        }
        if &src[0..4] != MAGIC {
            return Err(PsarcError::BadMagic);
        }
        let version_major = byteorder::read_u16(&src[4..6])?;
        let version_minor = byteorder::read_u16(&src[6..8])?;
        let mut compression_tag = [0u8; 4];
        compression_tag.copy_from_slice(&src[8..12]);
        let toc_length = byteorder::read_u32(&src[12..16])?;
        let toc_entry_size = byteorder::read_u32(&src[16..20])?;
        if toc_entry_size != TOC_ENTRY_SIZE {
            return Err(PsarcError::BadTocEntrySize(toc_entry_size));
        }
        let toc_entries = byteorder::read_u32(&src[20..24])?;
        let block_size = byteorder::read_u32(&src[24..28])?;
        let archive_flags = byteorder::read_u32(&src[28..32])?;

        Ok(ArchiveHeader {
            version_major,
            version_minor,
            compression_tag,
            toc_length,
            toc_entry_size,
            toc_entries,
            block_size,
            archive_flags,
        })
    }
}
