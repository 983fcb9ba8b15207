//! Archive creation.
//!
//! Builds an on-disk PSARC from an ordered [`PathSet`]. The TOC length is
//! known before any compressed byte is written (block counts depend only on
//! uncompressed sizes), so the data region can be streamed straight into its
//! final offsets in one pass: reserve the header+TOC+block-table bytes,
//! stream the manifest and every file's blocks through the ordered pool,
//! then go back and fill in the header/TOC/block-table now that every size
//! is known.

use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::blockcodec::{compress_block, scratch_buffer_size};
use crate::config::{Compression, Config};
use crate::error::{PsarcError, Result};
use crate::format::{block_table_width, encode_block_table, ArchiveHeader, TocEntry, HEADER_SIZE, TOC_ENTRY_SIZE};
use crate::md5::{digest_path, DigestBytes, MANIFEST_DIGEST};
use crate::path::{normalize::stored_path, PathSet};
use crate::pool::OrderedPool;
use crate::reporter::{FileRecord, Kind, Reporter, Status, Totals};

/// Per-entry bookkeeping accumulated as its blocks commit. Entry 0 is
/// always the manifest.
struct PackEntry {
    stored_path: String,
    digest: DigestBytes,
    uncompressed_size: u64,
    block_count: u32,
    block_offset: u32,
    file_offset: u64,
    compressed_size: u64,
}

enum PackEvent {
    FileBegin { entry: usize },
    FileEnd {
        entry: usize,
        uncompressed: u64,
        compressed: u64,
    },
}

struct WriteState {
    file: File,
    cursor: u64,
    block_sizes: Vec<u32>,
    entries: Vec<PackEntry>,
}

/// Packs `paths` into a new archive at `config.archive_path`.
pub fn pack(paths: &PathSet, config: &Config, reporter: &mut dyn Reporter) -> Result<()> {
    // Resolve the archive path to an absolute form before any `source_dir`
    // chdir, so it remains valid afterwards.
    let mut config = config.clone();
    config.archive_path = crate::unpacker::resolve_archive_path(&config.archive_path);
    let config = &config;

    if let Some(dir) = &config.source_dir {
        std::env::set_current_dir(dir).map_err(|source| PsarcError::IoOpen {
            path: dir.clone(),
            source,
        })?;
    }

    if config.archive_path.exists() && !config.overwrite {
        return Err(PsarcError::ArchiveExists(config.archive_path.clone()));
    }

    reporter.open(Kind::Pack, &config.archive_path.to_string_lossy());
    reporter.open_file_section();

    let width = block_table_width(config.block_size)?;
    let block_size = config.block_size as u64;

    let stored_paths: Vec<(std::path::PathBuf, String)> = paths
        .iter()
        .map(|p| {
            (
                p.clone(),
                stored_path(p, config.trim_path, config.absolute_paths()),
            )
        })
        .collect();

    let manifest = stored_paths
        .iter()
        .map(|(_, s)| s.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let manifest_bytes = manifest.into_bytes();

    let mut entries = Vec::with_capacity(stored_paths.len() + 1);
    entries.push(PackEntry {
        stored_path: String::new(),
        digest: MANIFEST_DIGEST,
        uncompressed_size: manifest_bytes.len() as u64,
        block_count: block_count_for(manifest_bytes.len() as u64, block_size),
        block_offset: 0,
        file_offset: 0,
        compressed_size: 0,
    });

    for (path, stored) in &stored_paths {
        let meta = fs::metadata(path).map_err(|_| PsarcError::SourceMissing(path.clone()))?;
        let size = meta.len();
        entries.push(PackEntry {
            stored_path: stored.clone(),
            digest: digest_path(stored),
            uncompressed_size: size,
            block_count: block_count_for(size, block_size),
            block_offset: 0,
            file_offset: 0,
            compressed_size: 0,
        });
    }

    let total_blocks: u64 = entries.iter().map(|e| e.block_count as u64).sum();
    let toc_length = HEADER_SIZE as u64
        + TOC_ENTRY_SIZE as u64 * entries.len() as u64
        + width as u64 * total_blocks;

    debug!(
        "packing {} entries, {} total blocks, toc_length={}",
        entries.len(),
        total_blocks,
        toc_length
    );

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&config.archive_path)
        .map_err(|source| PsarcError::IoOpen {
            path: config.archive_path.clone(),
            source,
        })?;
    file.set_len(toc_length).map_err(|source| PsarcError::IoWrite {
        path: config.archive_path.clone(),
        source,
    })?;
    file.seek(SeekFrom::Start(toc_length))
        .map_err(|source| PsarcError::IoSeek {
            path: config.archive_path.clone(),
            source,
        })?;

    let state = Arc::new(Mutex::new(WriteState {
        file,
        cursor: toc_length,
        block_sizes: Vec::with_capacity(total_blocks as usize),
        entries,
    }));

    let scratch_size = scratch_buffer_size(config.block_size);
    let pool = OrderedPool::new(config.num_threads, scratch_size);
    let (tx, rx) = crossbeam_channel::unbounded::<PackEvent>();

    let pack_result = run_entries(
        &pool,
        &state,
        &tx,
        config,
        &manifest_bytes,
        &stored_paths,
        reporter,
        &rx,
    );

    if let Err(err) = pack_result {
        pool.drain();
        drop(tx);
        while rx.try_recv().is_ok() {}
        drop(state);
        let _ = fs::remove_file(&config.archive_path);
        return Err(err);
    }

    pool.drain();
    drain_events(&rx, &mut *state.lock().unwrap(), reporter);

    let mut state = Arc::try_unwrap(state)
        .map_err(|_| PsarcError::PackFailed("pool left dangling references".into()))?
        .into_inner()
        .map_err(|_| PsarcError::PackFailed("write state lock poisoned".into()))?;

    finalize_archive(&mut state, config, width, total_blocks as u32)?;

    let totals = Totals {
        files: (state.entries.len() - 1) as u64,
        uncompressed_size: state.entries.iter().map(|e| e.uncompressed_size).sum(),
        compressed_size: state.entries.iter().map(|e| e.compressed_size).sum(),
        errors: 0,
    };
    reporter.close_file_section();
    reporter.close(totals);
    trace!("pack complete: {} bytes written", state.cursor);
    Ok(())
}

fn block_count_for(size: u64, block_size: u64) -> u32 {
    ((size + block_size - 1) / block_size.max(1)) as u32
}

/// Drives the manifest and every file through the ordered pool, emitting
/// begin/end reporter events as they commit (via a non-blocking drain of
/// `rx` between submissions, which keeps the `Reporter` entirely on the
/// calling thread even though the archive writes themselves happen from
/// worker threads).
fn run_entries(
    pool: &OrderedPool,
    state: &Arc<Mutex<WriteState>>,
    tx: &crossbeam_channel::Sender<PackEvent>,
    config: &Config,
    manifest_bytes: &[u8],
    stored_paths: &[(std::path::PathBuf, String)],
    reporter: &mut dyn Reporter,
    rx: &crossbeam_channel::Receiver<PackEvent>,
) -> Result<()> {
    let mut manifest_reader = Cursor::new(manifest_bytes);
    feed_entry_blocks(
        pool,
        state,
        tx,
        config,
        0,
        &mut manifest_reader,
        manifest_bytes.len() as u64,
    )?;
    drain_events_nonblocking(rx, state, reporter);

    for (idx, (path, _)) in stored_paths.iter().enumerate() {
        let entry_index = idx + 1;
        let size = {
            let st = state.lock().unwrap();
            st.entries[entry_index].uncompressed_size
        };
        let mut file = File::open(path).map_err(|_| {
            reporter.error(&format!("failed to open {}", path.display()));
            PsarcError::PackFailed(format!("failed to open {}", path.display()))
        })?;
        feed_entry_blocks(pool, state, tx, config, entry_index, &mut file, size)?;
        drain_events_nonblocking(rx, state, reporter);
    }
    Ok(())
}

fn drain_events_nonblocking(
    rx: &crossbeam_channel::Receiver<PackEvent>,
    state: &Arc<Mutex<WriteState>>,
    reporter: &mut dyn Reporter,
) {
    let st = state.lock().unwrap();
    while let Ok(event) = rx.try_recv() {
        emit_event(event, &st, reporter);
    }
}

fn drain_events(rx: &crossbeam_channel::Receiver<PackEvent>, st: &mut WriteState, reporter: &mut dyn Reporter) {
    while let Ok(event) = rx.try_recv() {
        emit_event(event, st, reporter);
    }
}

fn emit_event(event: PackEvent, st: &WriteState, reporter: &mut dyn Reporter) {
    match event {
        PackEvent::FileBegin { entry } => {
            if entry == 0 {
                return;
            }
            let e = &st.entries[entry];
            reporter.open_file_item(&FileRecord {
                stored_path: e.stored_path.clone(),
                uncompressed_size: e.uncompressed_size,
                compressed_size: 0,
            });
        }
        PackEvent::FileEnd {
            entry,
            uncompressed,
            compressed,
        } => {
            if entry == 0 {
                return;
            }
            let more_follow = entry != st.entries.len() - 1;
            reporter.close_file_item(uncompressed, compressed, Status::Ok, more_follow);
        }
    }
}

/// Submits every block of one entry's data to the ordered pool, including
/// the zero-block case (an empty file still needs exactly one ticket to
/// record its offsets in the correct commit order).
#[allow(clippy::too_many_arguments)]
fn feed_entry_blocks(
    pool: &OrderedPool,
    state: &Arc<Mutex<WriteState>>,
    tx: &crossbeam_channel::Sender<PackEvent>,
    config: &Config,
    entry_index: usize,
    reader: &mut dyn Read,
    uncompressed_size: u64,
) -> Result<()> {
    let block_size = config.block_size as usize;
    let block_count = block_count_for(uncompressed_size, config.block_size as u64);

    if block_count == 0 {
        let slot = pool.acquire();
        let state = Arc::clone(state);
        let tx = tx.clone();
        pool.submit(slot, move |ticket| {
            ticket.gate();
            {
                let mut st = state.lock().unwrap();
                let block_offset = st.block_sizes.len() as u32;
                let file_offset = st.cursor;
                let e = &mut st.entries[entry_index];
                e.block_offset = block_offset;
                e.file_offset = file_offset;
            }
            let _ = tx.send(PackEvent::FileBegin { entry: entry_index });
            let _ = tx.send(PackEvent::FileEnd {
                entry: entry_index,
                uncompressed: 0,
                compressed: 0,
            });
            ticket.complete();
        });
        return Ok(());
    }

    for i in 0..block_count {
        let mut slot = pool.acquire();
        let n = read_full(reader, &mut slot.scratch[..block_size])?;
        let is_first = i == 0;
        let is_last = i == block_count - 1;
        let compression = config.compression;
        let level = config.compression_level;
        let extreme = config.extreme;
        let state = Arc::clone(state);
        let tx = tx.clone();

        pool.submit(slot, move |mut ticket| {
            let compressed = {
                let scratch = ticket.scratch();
                compress_block(&scratch[..n], compression, level, extreme)
            };
            ticket.gate();
            let (file_offset, uncompressed_total, compressed_total) = {
                let mut st = state.lock().unwrap();
                if is_first {
                    let block_offset = st.block_sizes.len() as u32;
                    let file_offset = st.cursor;
                    let e = &mut st.entries[entry_index];
                    e.block_offset = block_offset;
                    e.file_offset = file_offset;
                }
                let write_offset = st.cursor;
                st.file
                    .write_all(&compressed)
                    .expect("sequential write to reserved archive region");
                st.cursor += compressed.len() as u64;
                st.block_sizes.push(compressed.len() as u32);
                let e = &mut st.entries[entry_index];
                e.compressed_size += compressed.len() as u64;
                (write_offset, e.uncompressed_size, e.compressed_size)
            };
            let _ = file_offset;
            if is_first {
                let _ = tx.send(PackEvent::FileBegin { entry: entry_index });
            }
            if is_last {
                let _ = tx.send(PackEvent::FileEnd {
                    entry: entry_index,
                    uncompressed: uncompressed_total,
                    compressed: compressed_total,
                });
            }
            ticket.complete();
        });
    }
    Ok(())
}

fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(PsarcError::IoRead {
                    path: std::path::PathBuf::new(),
                    source,
                })
            }
        }
    }
    Ok(total)
}

fn finalize_archive(state: &mut WriteState, config: &Config, width: u8, total_blocks: u32) -> Result<()> {
    let block_table = encode_block_table(&state.block_sizes, config.block_size, width)?;

    let toc_entries: Vec<TocEntry> = state
        .entries
        .iter()
        .map(|e| TocEntry {
            name_digest: e.digest,
            block_offset: e.block_offset,
            uncompressed_size: e.uncompressed_size,
            file_offset: e.file_offset,
        })
        .collect();

    let toc_length = HEADER_SIZE as u64
        + TOC_ENTRY_SIZE as u64 * toc_entries.len() as u64
        + width as u64 * total_blocks as u64;

    let header = ArchiveHeader {
        version_major: 1,
        version_minor: 4,
        compression_tag: *config.compression.header_tag(),
        toc_length: toc_length as u32,
        toc_entry_size: TOC_ENTRY_SIZE,
        toc_entries: toc_entries.len() as u32,
        block_size: config.block_size,
        archive_flags: config.flags,
    };

    let path = &config.archive_path;
    state
        .file
        .seek(SeekFrom::Start(0))
        .map_err(|source| PsarcError::IoSeek {
            path: path.clone(),
            source,
        })?;
    state
        .file
        .write_all(&header.encode())
        .map_err(|source| PsarcError::IoWrite {
            path: path.clone(),
            source,
        })?;
    for entry in &toc_entries {
        state
            .file
            .write_all(&entry.encode())
            .map_err(|source| PsarcError::IoWrite {
                path: path.clone(),
                source,
            })?;
    }
    state
        .file
        .write_all(&block_table)
        .map_err(|source| PsarcError::IoWrite {
            path: path.clone(),
            source,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathSet) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello world").unwrap();
        fs::write(dir.path().join("b.txt"), vec![b'x'; 4096]).unwrap();
        let mut set = PathSet::new();
        set.add(dir.path().join("a.txt"));
        set.add(dir.path().join("b.txt"));
        (dir, set)
    }

    #[test]
    fn packs_two_files_and_reports_them() {
        let (dir, set) = setup();
        let archive = dir.path().join("out.psarc");
        let config = Config::builder(&archive)
            .compression(Compression::Store)
            .num_threads(1)
            .build()
            .unwrap();
        let mut reporter = RecordingReporter::default();
        pack(&set, &config, &mut reporter).unwrap();
        assert!(archive.exists());
        assert!(reporter.events.iter().any(|e| e.contains("a.txt")));
        assert!(reporter.events.iter().any(|e| e.contains("b.txt")));
    }

    #[test]
    fn refuses_to_overwrite_without_flag() {
        let (dir, set) = setup();
        let archive = dir.path().join("out.psarc");
        fs::write(&archive, b"existing").unwrap();
        let config = Config::builder(&archive).build().unwrap();
        let mut reporter = RecordingReporter::default();
        let err = pack(&set, &config, &mut reporter);
        assert!(matches!(err, Err(PsarcError::ArchiveExists(_))));
    }

    #[test]
    fn header_declares_entry_count_including_manifest() {
        let (dir, set) = setup();
        let archive = dir.path().join("out.psarc");
        let config = Config::builder(&archive)
            .compression(Compression::Store)
            .num_threads(1)
            .build()
            .unwrap();
        let mut reporter = RecordingReporter::default();
        pack(&set, &config, &mut reporter).unwrap();

        let bytes = fs::read(&archive).unwrap();
        let header = ArchiveHeader::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.toc_entries, 3); // manifest + 2 files
    }

    #[test]
    fn missing_source_file_aborts_and_removes_partial_archive() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.txt");
        let mut set = PathSet::new();
        set.add(&missing);
        let archive = dir.path().join("out.psarc");
        let config = Config::builder(&archive).build().unwrap();
        let mut reporter = RecordingReporter::default();
        let err = pack(&set, &config, &mut reporter);
        assert!(err.is_err());
        assert!(!archive.exists());
    }
}
