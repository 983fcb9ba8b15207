//! Binary entry point for the `psarc` command-line tool.
//!
//! Parses arguments into a [`psarc::Config`], dispatches to the packer or
//! unpacker, and maps the outcome onto an exit code: 0 success, 1
//! usage/unrecoverable error, 2 completed with per-entry failures.

use clap::Parser;

use psarc::cli::{args::resolve_create_inputs, Cli, Command};
use psarc::reporter::{PlainReporter, Reporter};
use psarc::unpacker::Archive;
use psarc::{pack, Config, PsarcError};

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let mut reporter = PlainReporter::with_verbose(config.verbose);
    let result = match &cli.command {
        Command::Create { inputs, recursive, ignore_case, .. } => {
            run_create(inputs, *recursive, *ignore_case, &config, &mut reporter)
        }
        Command::Extract { paths, .. } => run_extract(cli.archive_path(), paths, &config, &mut reporter),
        Command::List { archive } => run_list(archive, &mut reporter),
        Command::Info { archive } => run_info(archive, &mut reporter),
    };

    match result {
        Ok(errors) if errors > 0 => 2,
        Ok(_) => 0,
        Err(err) => {
            reporter.error(&err.to_string());
            1
        }
    }
}

/// Every dispatch function returns the number of per-entry failures so
/// `run` can map that onto exit code 2, distinct from a hard `Err` (exit 1).
fn run_create(
    inputs: &[String],
    recursive: bool,
    ignore_case: bool,
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<u64, PsarcError> {
    let paths = resolve_create_inputs(inputs, recursive, ignore_case)?;
    if paths.is_empty() {
        return Err(PsarcError::Usage("no input files matched".into()));
    }
    pack(&paths, config, reporter)?;
    Ok(0)
}

fn run_extract(
    archive_path: &std::path::Path,
    paths: &[String],
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<u64, PsarcError> {
    let archive = Archive::open(archive_path)?;
    psarc::extract(&archive, archive_path, paths, config, reporter)
}

fn run_list(archive_path: &std::path::Path, reporter: &mut dyn Reporter) -> Result<u64, PsarcError> {
    let archive = Archive::open(archive_path)?;
    archive.list(&archive_path.to_string_lossy(), reporter);
    Ok(0)
}

fn run_info(archive_path: &std::path::Path, reporter: &mut dyn Reporter) -> Result<u64, PsarcError> {
    let archive = Archive::open(archive_path)?;
    archive.info(&archive_path.to_string_lossy(), reporter);
    Ok(0)
}
