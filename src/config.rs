//! Immutable configuration surface consumed by the packer and unpacker.
//!
//! No process-wide mutable configuration survives here: a `Config` is built
//! once (typically from parsed CLI arguments) and threaded by value/reference
//! into `Packer`/`Unpacker` constructors. Nothing under `packer`/`unpacker`
//! reaches for a global.

use std::path::PathBuf;

use crate::error::{PsarcError, Result};

/// Default block size: 64 KiB, per the PSARC convention.
pub const DEFAULT_BLOCK_SIZE: u32 = 65536;

/// Bit 0 of `archive_flags`: stored-path comparisons are case-insensitive.
pub const FLAG_IGNORE_CASE: u32 = 1 << 0;
/// Bit 1 of `archive_flags`: stored paths are absolute (leading `/`).
pub const FLAG_ABSOLUTE_PATHS: u32 = 1 << 1;

/// The three block-compression strategies a PSARC archive can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Store,
    Zlib,
    Lzma,
}

impl Compression {
    /// The 4-byte ASCII compression identifier written into the header.
    pub fn header_tag(self) -> &'static [u8; 4] {
        match self {
            // Store archives carry "zlib" by convention.
            Compression::Store | Compression::Zlib => b"zlib",
            Compression::Lzma => b"lzma",
        }
    }
}

/// Builder-constructed, validated-once configuration shared by pack and
/// unpack operations. Fields not meaningful to one direction are simply
/// unused by it (e.g. `compression` is pack-only).
#[derive(Debug, Clone)]
pub struct Config {
    pub archive_path: PathBuf,
    pub compression: Compression,
    pub compression_level: u32,
    pub extreme: bool,
    pub block_size: u32,
    pub flags: u32,
    pub source_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub trim_path: bool,
    pub recursive: bool,
    pub overwrite: bool,
    pub skip_existing_files: bool,
    pub num_threads: usize,
    pub verbose: bool,
}

impl Config {
    pub fn builder(archive_path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder::new(archive_path)
    }

    pub fn ignore_case(&self) -> bool {
        self.flags & FLAG_IGNORE_CASE != 0
    }

    pub fn absolute_paths(&self) -> bool {
        self.flags & FLAG_ABSOLUTE_PATHS != 0
    }

    fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(PsarcError::Usage("block_size must be positive".into()));
        }
        if self.compression_level > 9 {
            return Err(PsarcError::Usage("compression_level must be 0..=9".into()));
        }
        if self.compression_level == 0 && self.compression != Compression::Lzma {
            return Err(PsarcError::Usage(
                "compression_level 0 is only valid for lzma".into(),
            ));
        }
        if self.extreme && self.compression != Compression::Lzma {
            return Err(PsarcError::Usage("extreme is only valid for lzma".into()));
        }
        if self.source_dir.is_some() && self.target_dir.is_some() {
            return Err(PsarcError::Usage(
                "source_dir and target_dir are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// Builds a [`Config`], defaulting every field the caller does not set
/// explicitly, then validates once on [`ConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        ConfigBuilder {
            inner: Config {
                archive_path: archive_path.into(),
                compression: Compression::Zlib,
                compression_level: 9,
                extreme: false,
                block_size: DEFAULT_BLOCK_SIZE,
                flags: 0,
                source_dir: None,
                target_dir: None,
                trim_path: false,
                recursive: false,
                overwrite: false,
                skip_existing_files: false,
                num_threads: num_cpus::get(),
                verbose: false,
            },
        }
    }

    pub fn compression(mut self, c: Compression) -> Self {
        self.inner.compression = c;
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.inner.compression_level = level;
        self
    }

    pub fn extreme(mut self, extreme: bool) -> Self {
        self.inner.extreme = extreme;
        self
    }

    pub fn block_size(mut self, size: u32) -> Self {
        self.inner.block_size = size;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.inner.flags = flags;
        self
    }

    pub fn ignore_case(mut self, enabled: bool) -> Self {
        if enabled {
            self.inner.flags |= FLAG_IGNORE_CASE;
        } else {
            self.inner.flags &= !FLAG_IGNORE_CASE;
        }
        self
    }

    pub fn absolute_paths(mut self, enabled: bool) -> Self {
        if enabled {
            self.inner.flags |= FLAG_ABSOLUTE_PATHS;
        } else {
            self.inner.flags &= !FLAG_ABSOLUTE_PATHS;
        }
        self
    }

    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner.source_dir = Some(dir.into());
        self
    }

    pub fn target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner.target_dir = Some(dir.into());
        self
    }

    pub fn trim_path(mut self, trim: bool) -> Self {
        self.inner.trim_path = trim;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.inner.recursive = recursive;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.inner.overwrite = overwrite;
        self
    }

    pub fn skip_existing_files(mut self, skip: bool) -> Self {
        self.inner.skip_existing_files = skip;
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.inner.num_threads = n;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.inner.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::builder("out.psarc").build().unwrap();
        assert_eq!(cfg.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(cfg.compression, Compression::Zlib);
        assert!(!cfg.ignore_case());
        assert!(!cfg.absolute_paths());
    }

    #[test]
    fn rejects_zero_block_size() {
        let err = Config::builder("out.psarc").block_size(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_extreme_without_lzma() {
        let err = Config::builder("out.psarc")
            .compression(Compression::Zlib)
            .extreme(true)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_level_zero_for_zlib() {
        let err = Config::builder("out.psarc")
            .compression(Compression::Zlib)
            .compression_level(0)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn accepts_level_zero_for_lzma() {
        let cfg = Config::builder("out.psarc")
            .compression(Compression::Lzma)
            .compression_level(0)
            .build()
            .unwrap();
        assert_eq!(cfg.compression_level, 0);
    }

    #[test]
    fn flags_round_trip() {
        let cfg = Config::builder("out.psarc")
            .ignore_case(true)
            .absolute_paths(true)
            .build()
            .unwrap();
        assert!(cfg.ignore_case());
        assert!(cfg.absolute_paths());
    }

    #[test]
    fn rejects_both_source_and_target_dir() {
        let err = Config::builder("out.psarc")
            .source_dir("/tmp/a")
            .target_dir("/tmp/b")
            .build();
        assert!(err.is_err());
    }
}
