//! Command-line front end for the `psarc` binary.

pub mod args;

pub use args::{Cli, Command};
