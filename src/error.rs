//! Unified error taxonomy for the PSARC codec.
//!
//! One variant per error kind named in the design's error-handling section.
//! `CompressFailed` is intentionally absent here: per policy it is handled
//! locally by the block codec (demotion to store) and never surfaces.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PsarcError>;

#[derive(Error, Debug)]
pub enum PsarcError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("archive already exists: {0}")]
    ArchiveExists(PathBuf),

    #[error("failed to open {path}: {source}")]
    IoOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to seek in {path}: {source}")]
    IoSeek {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad magic: expected \"PSAR\", archive is not a PSARC file")]
    BadMagic,

    #[error("bad TOC entry size: expected 30, found {0}")]
    BadTocEntrySize(u32),

    #[error("bad block size: {0} (must be in (0, 2^32])")]
    BadBlockSize(u64),

    #[error("truncated archive: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("failed to decompress block at archive offset {offset}")]
    DecompressFailed { offset: u64 },

    #[error("source file missing or unreadable: {0}")]
    SourceMissing(PathBuf),

    #[error("extraction target already exists: {0}")]
    OutputExists(PathBuf),

    #[error("out of memory")]
    OutOfMemory,

    #[error("packing failed: {0}")]
    PackFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
