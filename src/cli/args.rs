//! Command-line surface for the `psarc` binary.
//!
//! A thin `clap::Parser` derive tree mapping 1:1 onto [`crate::config::Config`]
//! (plus the positional archive/input arguments). This is a caller of the
//! library; no format or business logic lives here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Compression, Config};
use crate::error::{PsarcError, Result};

#[derive(Parser, Debug)]
#[command(name = "psarc", version, about = "PSARC archive packer/unpacker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Number of worker threads (0 = run synchronously). Defaults to the
    /// number of logical CPUs.
    #[arg(long, global = true)]
    pub num_threads: Option<usize>,

    /// Emit per-file byte counts as work progresses.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new archive from a set of input files/patterns.
    Create {
        /// Path of the archive to create.
        archive: PathBuf,
        /// Input file paths or glob patterns.
        #[arg(required = true)]
        inputs: Vec<String>,

        #[arg(long, value_enum, default_value = "zlib")]
        compression: CompressionArg,
        #[arg(long, default_value_t = 9)]
        compression_level: u32,
        #[arg(long)]
        extreme: bool,
        #[arg(long, default_value_t = 65536)]
        block_size: u32,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        ignore_case: bool,
        #[arg(long)]
        absolute_paths: bool,
        #[arg(long)]
        trim_path: bool,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        source_dir: Option<PathBuf>,
    },

    /// Extract some or all entries of an archive to the current directory.
    Extract {
        archive: PathBuf,
        /// Stored paths to extract; omit to extract every entry.
        paths: Vec<String>,

        #[arg(long)]
        trim_path: bool,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        skip_existing_files: bool,
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },

    /// List an archive's entries with their sizes.
    List { archive: PathBuf },

    /// Show archive header metadata and aggregate totals.
    Info { archive: PathBuf },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum CompressionArg {
    Store,
    Zlib,
    Lzma,
}

impl From<CompressionArg> for Compression {
    fn from(value: CompressionArg) -> Self {
        match value {
            CompressionArg::Store => Compression::Store,
            CompressionArg::Zlib => Compression::Zlib,
            CompressionArg::Lzma => Compression::Lzma,
        }
    }
}

impl Cli {
    /// Builds the [`Config`] implied by the selected subcommand and the
    /// global flags, validating once.
    pub fn to_config(&self) -> Result<Config> {
        let num_threads = self.num_threads.unwrap_or_else(num_cpus::get);
        match &self.command {
            Command::Create {
                archive,
                compression,
                compression_level,
                extreme,
                block_size,
                recursive,
                ignore_case,
                absolute_paths,
                trim_path,
                overwrite,
                source_dir,
                ..
            } => {
                let mut builder = Config::builder(archive)
                    .compression((*compression).into())
                    .compression_level(*compression_level)
                    .extreme(*extreme)
                    .block_size(*block_size)
                    .recursive(*recursive)
                    .ignore_case(*ignore_case)
                    .absolute_paths(*absolute_paths)
                    .trim_path(*trim_path)
                    .overwrite(*overwrite)
                    .num_threads(num_threads)
                    .verbose(self.verbose);
                if let Some(dir) = source_dir {
                    builder = builder.source_dir(dir.clone());
                }
                builder.build()
            }
            Command::Extract {
                archive,
                trim_path,
                overwrite,
                skip_existing_files,
                target_dir,
                ..
            } => {
                let mut builder = Config::builder(archive)
                    .trim_path(*trim_path)
                    .overwrite(*overwrite)
                    .skip_existing_files(*skip_existing_files)
                    .num_threads(num_threads)
                    .verbose(self.verbose);
                if let Some(dir) = target_dir {
                    builder = builder.target_dir(dir.clone());
                }
                builder.build()
            }
            Command::List { archive } | Command::Info { archive } => {
                Config::builder(archive).num_threads(num_threads).verbose(self.verbose).build()
            }
        }
    }

    pub fn archive_path(&self) -> &PathBuf {
        match &self.command {
            Command::Create { archive, .. }
            | Command::Extract { archive, .. }
            | Command::List { archive }
            | Command::Info { archive } => archive,
        }
    }
}

/// Resolves `Command::Create`'s input patterns into the ordered, deduped
/// path set the packer expects.
pub fn resolve_create_inputs(inputs: &[String], recursive: bool, ignore_case: bool) -> Result<crate::path::PathSet> {
    crate::path::walker::walk(inputs, recursive, ignore_case)
}

pub fn usage_error(message: impl Into<String>) -> PsarcError {
    PsarcError::Usage(message.into())
}
