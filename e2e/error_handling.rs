//! Exercises the failure paths: truncated archives, bad magic, refusal to
//! clobber, missing sources, and the CLI's exit-code mapping for each.

use std::fs;
use std::process::Command;

use psarc::config::Compression;
use psarc::path::PathSet;
use psarc::reporter::{FileRecord, Kind, Reporter, Status, Totals};
use psarc::unpacker::Archive;
use psarc::{pack, Config, PsarcError};
use tempfile::TempDir;

struct NullReporter;
impl Reporter for NullReporter {
    fn open(&mut self, _kind: Kind, _archive_name: &str) {}
    fn open_file_section(&mut self) {}
    fn open_file_item(&mut self, _record: &FileRecord) {}
    fn close_file_item(&mut self, _uncompressed: u64, _compressed: u64, _status: Status, _more_follow: bool) {}
    fn close_file_section(&mut self) {}
    fn close(&mut self, _totals: Totals) {}
    fn error(&mut self, _message: &str) {}
}

fn psarc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_psarc"))
}

#[test]
fn opening_a_truncated_archive_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("out.psarc");
    fs::write(dir.path().join("a.txt"), b"hi").unwrap();
    let mut set = PathSet::new();
    set.add(dir.path().join("a.txt"));
    let config = Config::builder(&archive).compression(Compression::Store).num_threads(1).build().unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();

    let full = fs::read(&archive).unwrap();
    let truncated = dir.path().join("truncated.psarc");
    fs::write(&truncated, &full[..full.len() / 2]).unwrap();

    let err = Archive::open(&truncated);
    assert!(matches!(err, Err(PsarcError::Truncated { .. })));
}

#[test]
fn opening_a_non_psarc_file_reports_bad_magic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-an-archive.psarc");
    fs::write(&path, b"this is definitely not a PSARC header").unwrap();

    let err = Archive::open(&path);
    assert!(matches!(err, Err(PsarcError::BadMagic)));
}

#[test]
fn packing_over_an_existing_archive_without_overwrite_errors() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("out.psarc");
    fs::write(&archive, b"pre-existing").unwrap();
    fs::write(dir.path().join("a.txt"), b"hi").unwrap();

    let mut set = PathSet::new();
    set.add(dir.path().join("a.txt"));
    let config = Config::builder(&archive).build().unwrap();
    let err = pack(&set, &config, &mut NullReporter);
    assert!(matches!(err, Err(PsarcError::ArchiveExists(_))));
    // A rejected pack must never touch the caller's existing file.
    assert_eq!(fs::read(&archive).unwrap(), b"pre-existing");
}

#[test]
fn packing_a_missing_source_file_leaves_no_partial_archive() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("out.psarc");
    let mut set = PathSet::new();
    set.add(dir.path().join("does-not-exist.txt"));
    let config = Config::builder(&archive).build().unwrap();

    let err = pack(&set, &config, &mut NullReporter);
    assert!(matches!(err, Err(PsarcError::SourceMissing(_))));
    assert!(!archive.exists());
}

/// The CLI maps a hard `Err` to exit code 1 and writes a message to stderr.
#[test]
fn cli_create_with_missing_input_exits_one() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("out.psarc");

    let output = psarc()
        .current_dir(dir.path())
        .args(["create", archive.to_str().unwrap(), "missing.txt"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!archive.exists());
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}

/// Extracting into a directory that already holds the output file, without
/// `--overwrite` or `--skip-existing-files`, reports the conflict rather than
/// clobbering it and exits 2 (completed with per-entry failures).
#[test]
fn cli_extract_existing_file_without_overwrite_does_not_clobber() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"archived-contents").unwrap();
    let archive = dir.path().join("out.psarc");
    let create = psarc()
        .current_dir(dir.path())
        .args(["create", archive.to_str().unwrap(), "a.txt", "--compression", "store"])
        .output()
        .unwrap();
    assert!(create.status.success());

    let extract_dir = TempDir::new().unwrap();
    fs::write(extract_dir.path().join("a.txt"), b"pre-existing-contents").unwrap();

    let extract = psarc()
        .args([
            "extract",
            archive.to_str().unwrap(),
            "--target-dir",
            extract_dir.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_eq!(extract.status.code(), Some(2));
    assert_eq!(fs::read(extract_dir.path().join("a.txt")).unwrap(), b"pre-existing-contents");
}
