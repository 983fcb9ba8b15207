//! `psarc` — a PSARC (PlayStation Archive) codec: packs a set of input
//! files into a single container with per-block compression, and
//! unpacks/lists/inspects the container again.
//!
//! The binary format is described in [`format`]; [`packer`] and
//! [`unpacker`] drive the pack and unpack data flows respectively, both
//! built from the same byte-order ([`byteorder`]), digest ([`md5`]),
//! block-codec ([`blockcodec`]), path ([`path`]), and ordered-concurrency
//! ([`pool`]) primitives. [`config`] is the immutable configuration
//! surface consumed by both; [`reporter`] is the narrow progress-event
//! sink they report through; [`error`] is the crate's unified error
//! taxonomy.

pub mod blockcodec;
pub mod byteorder;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod md5;
pub mod packer;
pub mod path;
pub mod pool;
pub mod reporter;
pub mod unpacker;

pub use config::{Compression, Config};
pub use error::{PsarcError, Result};
pub use packer::pack;
pub use unpacker::{extract, Archive};
