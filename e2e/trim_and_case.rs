//! trim_path basename collisions and case-insensitive selection under
//! IGNORE_CASE.

use std::fs;

use psarc::config::Compression;
use psarc::path::PathSet;
use psarc::reporter::{FileRecord, Kind, Reporter, Status, Totals};
use psarc::unpacker::Archive;
use psarc::{extract, pack, Config};
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

/// Two files that share a basename but live in different directories.
/// `trim_path` collapses both stored paths to the same name; packing must
/// still succeed and preserve both as distinct TOC entries.
#[test]
fn trim_path_collapses_basenames_but_keeps_both_entries() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("dir1")).unwrap();
    fs::create_dir(dir.path().join("dir2")).unwrap();
    fs::write(dir.path().join("dir1/x"), b"one").unwrap();
    fs::write(dir.path().join("dir2/x"), b"two").unwrap();

    let mut set = PathSet::new();
    set.add(dir.path().join("dir1/x"));
    set.add(dir.path().join("dir2/x"));
    assert_eq!(set.len(), 2, "distinct files must not be deduped");

    let archive = dir.path().join("out.psarc");
    let config = Config::builder(&archive)
        .compression(Compression::Store)
        .trim_path(true)
        .num_threads(1)
        .build()
        .unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();

    let parsed = Archive::open(&archive).unwrap();
    assert_eq!(parsed.entries.len(), 2);
    assert_eq!(parsed.entries[0].stored_path, "x");
    assert_eq!(parsed.entries[1].stored_path, "x");
    assert_eq!(parsed.entries[0].uncompressed_size, 3);
    assert_eq!(parsed.entries[1].uncompressed_size, 3);
}

/// IGNORE_CASE archives match extraction filters case-insensitively,
/// while the stored path itself keeps its original case.
#[test]
fn ignore_case_archive_selects_by_folded_name() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("bar")).unwrap();
    fs::write(dir.path().join("Foo.TXT"), b"foo-contents").unwrap();
    fs::write(dir.path().join("bar/Baz.txt"), b"baz-contents").unwrap();

    let mut set = PathSet::new();
    set.add(dir.path().join("Foo.TXT"));
    set.add(dir.path().join("bar/Baz.txt"));

    let archive = dir.path().join("out.psarc");
    let config = Config::builder(&archive)
        .compression(Compression::Store)
        .ignore_case(true)
        .num_threads(1)
        .build()
        .unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();

    let parsed = Archive::open(&archive).unwrap();
    assert!(parsed.header.ignore_case());
    assert_eq!(parsed.entries[0].stored_path, "Foo.TXT");

    let extract_dir = TempDir::new().unwrap();
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(extract_dir.path()).unwrap();
    let extract_config = Config::builder(&archive).overwrite(true).build().unwrap();
    let result = extract(
        &parsed,
        &archive,
        &["foo.txt".to_string()],
        &extract_config,
        &mut NullReporter,
    );
    std::env::set_current_dir(cwd).unwrap();
    result.unwrap();

    // Output keeps the stored path's original case, even though the
    // filter that selected it was lowercase.
    let restored = fs::read(extract_dir.path().join("Foo.TXT")).unwrap();
    assert_eq!(restored, b"foo-contents");
    assert!(!extract_dir.path().join("bar").exists());
}
