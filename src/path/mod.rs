//! Source-path selection: walking, deduplication, and the stored/output path
//! mapping that the packer and unpacker both need.

pub mod normalize;
pub mod pathset;
pub mod walker;

pub use normalize::{output_path, stored_path};
pub use pathset::PathSet;
pub use walker::walk;
