//! Packing the same input set under different thread counts must produce
//! byte-identical archives.

use std::fs;

use psarc::config::Compression;
use psarc::path::PathSet;
use psarc::reporter::{FileRecord, Kind, Reporter, Status, Totals};
use psarc::{pack, Config};
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

fn make_source_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut state: u32 = 0x9E3779B9;
    for i in 0..64u32 {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        let len = 128 + (state % 4096) as usize;
        let data: Vec<u8> = (0..len)
            .map(|j| ((i as usize * 31 + j) % 256) as u8)
            .collect();
        fs::write(dir.path().join(format!("file-{i:03}.bin")), &data).unwrap();
    }
    dir
}

fn pack_with_threads(dir: &TempDir, archive_name: &str, num_threads: usize) -> Vec<u8> {
    let mut set = PathSet::new();
    for i in 0..64u32 {
        set.add(dir.path().join(format!("file-{i:03}.bin")));
    }
    let archive = dir.path().join(archive_name);
    let config = Config::builder(&archive)
        .compression(Compression::Zlib)
        .compression_level(6)
        .num_threads(num_threads)
        .build()
        .unwrap();
    pack(&set, &config, &mut NullReporter).unwrap();
    fs::read(&archive).unwrap()
}

#[test]
fn same_input_set_produces_identical_archives_across_thread_counts() {
    let dir = make_source_tree();

    let single = pack_with_threads(&dir, "single.psarc", 1);
    let quad = pack_with_threads(&dir, "quad.psarc", 4);
    let wide = pack_with_threads(&dir, "wide.psarc", 16);

    assert_eq!(single, quad, "4-thread pack diverged from the 1-thread baseline");
    assert_eq!(single, wide, "16-thread pack diverged from the 1-thread baseline");
}
