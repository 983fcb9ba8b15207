//! Archive inspection and extraction.
//!
//! Opens an existing PSARC, parses its header/TOC/block-table, and recovers
//! the manifest (the newline-separated stored-path list carried as TOC
//! entry 0). From there it supports three read-only modes — list, info,
//! and extract — all driven from the same parsed [`Archive`].

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::blockcodec::decompress_block;
use crate::config::Config;
use crate::error::{PsarcError, Result};
use crate::format::{block_table_width, decode_block_table, ArchiveHeader, TocEntry, HEADER_SIZE, TOC_ENTRY_SIZE};
use crate::path::normalize::output_path;
use crate::reporter::{FileRecord, Kind, Reporter, Status, Totals};

/// One non-manifest TOC entry, resolved against the manifest's path list.
#[derive(Debug, Clone)]
pub struct Entry {
    pub stored_path: String,
    pub name_digest: [u8; 16],
    pub block_offset: u32,
    pub block_count: u32,
    pub uncompressed_size: u64,
    pub file_offset: u64,
    pub compressed_size: u64,
}

/// A fully parsed archive: header, per-entry metadata, and the block table,
/// ready for list/info/extract.
pub struct Archive {
    pub header: ArchiveHeader,
    pub entries: Vec<Entry>,
    /// Uncompressed/compressed size of the manifest itself (TOC entry 0),
    /// kept separate from `entries` since the manifest is not a file a
    /// caller would ever select for extraction.
    pub manifest_uncompressed_size: u64,
    pub manifest_compressed_size: u64,
    block_sizes: Vec<u32>,
}

impl Archive {
    /// Reads and validates `path`'s header, TOC, block table, and manifest.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|source| PsarcError::IoOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes).map_err(|_| PsarcError::Truncated {
            needed: HEADER_SIZE,
            available: 0,
        })?;
        let header = ArchiveHeader::decode(&header_bytes)?;
        let width = block_table_width(header.block_size)?;

        let toc_bytes_len = TOC_ENTRY_SIZE as usize * header.toc_entries as usize;
        let mut toc_bytes = vec![0u8; toc_bytes_len];
        file.read_exact(&mut toc_bytes)
            .map_err(|_| PsarcError::Truncated { needed: toc_bytes_len, available: 0 })?;
        let toc_entries: Vec<TocEntry> = toc_bytes
            .chunks_exact(TOC_ENTRY_SIZE as usize)
            .map(TocEntry::decode)
            .collect::<Result<_>>()?;

        if (header.toc_length as usize) < HEADER_SIZE + toc_bytes_len {
            return Err(PsarcError::Truncated {
                needed: HEADER_SIZE + toc_bytes_len,
                available: header.toc_length as usize,
            });
        }
        let table_bytes_len = header.toc_length as usize - HEADER_SIZE - toc_bytes_len;
        let total_blocks = table_bytes_len / width as usize;
        let mut table_bytes = vec![0u8; table_bytes_len];
        file.read_exact(&mut table_bytes)
            .map_err(|_| PsarcError::Truncated { needed: table_bytes_len, available: 0 })?;
        let block_sizes = decode_block_table(&table_bytes, header.block_size, width, total_blocks)?;

        // Entry 0 is always the manifest; recover its payload to learn every
        // other entry's stored path.
        let manifest_entry = toc_entries.first().ok_or(PsarcError::BadTocEntrySize(0))?;
        let manifest_block_count = ((manifest_entry.uncompressed_size + header.block_size as u64 - 1)
            / header.block_size as u64)
            .max(if manifest_entry.uncompressed_size == 0 { 0 } else { 1 }) as usize;
        let manifest_compressed_size = sum_block_range(&block_sizes, 0, manifest_block_count as u32)?;
        let manifest_bytes = read_entry_payload(&mut file, manifest_entry, 0, &block_sizes, path)?;
        let manifest = String::from_utf8_lossy(&manifest_bytes);
        let stored_paths: Vec<&str> = if manifest.is_empty() {
            Vec::new()
        } else {
            manifest.split('\n').collect()
        };

        let mut entries = Vec::with_capacity(toc_entries.len().saturating_sub(1));
        for (i, toc) in toc_entries.iter().enumerate().skip(1) {
            let stored_path = stored_paths.get(i - 1).copied().unwrap_or("").to_string();
            let block_count = ((toc.uncompressed_size + header.block_size as u64 - 1)
                / header.block_size as u64)
                .max(if toc.uncompressed_size == 0 { 0 } else { 1 }) as u32;
            let compressed_size = sum_block_range(&block_sizes, toc.block_offset, block_count)?;
            entries.push(Entry {
                stored_path,
                name_digest: toc.name_digest,
                block_offset: toc.block_offset,
                block_count,
                uncompressed_size: toc.uncompressed_size,
                file_offset: toc.file_offset,
                compressed_size,
            });
        }

        Ok(Archive {
            header,
            entries,
            manifest_uncompressed_size: manifest_entry.uncompressed_size,
            manifest_compressed_size,
            block_sizes,
        })
    }

    /// Emits a `List` event stream: one `open_file_item`/`close_file_item`
    /// pair per entry, with sizes already known from the block table.
    pub fn list(&self, archive_name: &str, reporter: &mut dyn Reporter) {
        reporter.open(Kind::List, archive_name);
        reporter.open_file_section();
        let mut totals = Totals::default();
        for entry in &self.entries {
            reporter.open_file_item(&FileRecord {
                stored_path: entry.stored_path.clone(),
                uncompressed_size: entry.uncompressed_size,
                compressed_size: entry.compressed_size,
            });
            reporter.close_file_item(entry.uncompressed_size, entry.compressed_size, Status::Ok, true);
            totals.files += 1;
            totals.uncompressed_size += entry.uncompressed_size;
            totals.compressed_size += entry.compressed_size;
        }
        reporter.close_file_section();
        reporter.close(totals);
    }

    /// Like [`Archive::list`] but under `Kind::Info`, also surfacing the
    /// manifest itself as a row (stored path `"(manifest)"`) so aggregate
    /// totals reflect every byte the archive actually carries, not just the
    /// files a caller would extract.
    pub fn info(&self, archive_name: &str, reporter: &mut dyn Reporter) {
        reporter.open(Kind::Info, archive_name);
        reporter.open_file_section();
        let mut totals = Totals::default();

        reporter.open_file_item(&FileRecord {
            stored_path: "(manifest)".to_string(),
            uncompressed_size: self.manifest_uncompressed_size,
            compressed_size: self.manifest_compressed_size,
        });
        reporter.close_file_item(self.manifest_uncompressed_size, self.manifest_compressed_size, Status::Ok, true);
        totals.uncompressed_size += self.manifest_uncompressed_size;
        totals.compressed_size += self.manifest_compressed_size;

        for entry in &self.entries {
            reporter.open_file_item(&FileRecord {
                stored_path: entry.stored_path.clone(),
                uncompressed_size: entry.uncompressed_size,
                compressed_size: entry.compressed_size,
            });
            reporter.close_file_item(entry.uncompressed_size, entry.compressed_size, Status::Ok, true);
            totals.files += 1;
            totals.uncompressed_size += entry.uncompressed_size;
            totals.compressed_size += entry.compressed_size;
        }
        reporter.close_file_section();
        reporter.close(totals);
    }
}

/// Returns the indices of entries selected by `filter`. An empty filter
/// selects everything. Matching is case-folded when the archive declares
/// `IGNORE_CASE`, exact otherwise.
fn select_entries(entries: &[Entry], filter: &[String], ignore_case: bool) -> Vec<usize> {
    if filter.is_empty() {
        return (0..entries.len()).collect();
    }
    let folded_filter: Vec<String> = if ignore_case {
        filter.iter().map(|s| s.to_lowercase()).collect()
    } else {
        filter.clone()
    };
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            let candidate = if ignore_case { e.stored_path.to_lowercase() } else { e.stored_path.clone() };
            folded_filter.iter().any(|f| *f == candidate)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Extracts the entries selected by `filter` (empty = all) to the current
/// directory, honoring `config.trim_path`/`overwrite`/`skip_existing_files`.
///
/// Returns the number of per-file failures (status `Fail`) on success; a
/// non-zero count is how the caller learns to map a "completed with
/// per-entry failures" exit code rather than plain success. A hard `Err`
/// is reserved for failures that abort the whole operation (the archive
/// itself could not be opened, `target_dir` could not be entered).
pub fn extract(
    archive: &Archive,
    archive_path: &std::path::Path,
    filter: &[String],
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<u64> {
    // Resolved before the `target_dir` chdir below, so it stays valid
    // whether the caller passed a relative or absolute path.
    let archive_path = resolve_archive_path(archive_path);
    let archive_path = archive_path.as_path();

    if let Some(dir) = &config.target_dir {
        std::env::set_current_dir(dir).map_err(|source| PsarcError::IoOpen {
            path: dir.clone(),
            source,
        })?;
    }

    let mut file = File::open(archive_path).map_err(|source| PsarcError::IoOpen {
        path: archive_path.to_path_buf(),
        source,
    })?;

    reporter.open(Kind::Unpack, &archive_path.to_string_lossy());
    reporter.open_file_section();

    let selected = select_entries(&archive.entries, filter, archive.header.ignore_case());
    let mut totals = Totals::default();

    for (pos, &idx) in selected.iter().enumerate() {
        let entry = &archive.entries[idx];
        let more_follow = pos + 1 < selected.len();
        reporter.open_file_item(&FileRecord {
            stored_path: entry.stored_path.clone(),
            uncompressed_size: entry.uncompressed_size,
            compressed_size: entry.compressed_size,
        });

        let out_path = output_path(&entry.stored_path, config.trim_path);
        match extract_one(&mut file, archive, entry, &out_path, config) {
            Ok(Status::Ok) => {
                totals.files += 1;
                totals.uncompressed_size += entry.uncompressed_size;
                totals.compressed_size += entry.compressed_size;
                reporter.close_file_item(entry.uncompressed_size, entry.compressed_size, Status::Ok, more_follow);
            }
            Ok(Status::Exists) => {
                totals.errors += 1;
                reporter.close_file_item(0, 0, Status::Exists, more_follow);
            }
            Ok(status) => {
                reporter.close_file_item(0, 0, status, more_follow);
            }
            Err(err) => {
                totals.errors += 1;
                reporter.error(&err.to_string());
                reporter.close_file_item(0, 0, Status::Fail, more_follow);
            }
        }
    }

    reporter.close_file_section();
    reporter.close(totals);
    Ok(totals.errors)
}

fn extract_one(
    file: &mut File,
    archive: &Archive,
    entry: &Entry,
    out_path: &std::path::Path,
    config: &Config,
) -> Result<Status> {
    if out_path.exists() && !config.overwrite {
        return Ok(if config.skip_existing_files {
            Status::Skipped
        } else {
            Status::Exists
        });
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PsarcError::IoWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let data = read_entry_payload(file, &to_toc_entry(entry), entry.block_offset, &archive.block_sizes, out_path)?;

    let mut out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_path)
        .map_err(|source| PsarcError::IoOpen {
            path: out_path.to_path_buf(),
            source,
        })?;
    out.write_all(&data).map_err(|source| PsarcError::IoWrite {
        path: out_path.to_path_buf(),
        source,
    })?;
    Ok(Status::Ok)
}

/// Sums the compressed lengths of `count` blocks starting at `offset` in
/// `block_sizes`, bounds-checked against untrusted TOC fields: a crafted
/// archive's `block_offset`/`uncompressed_size` can claim a range past the
/// end of a short block table, and that must fail with `Truncated` rather
/// than panic on an out-of-bounds slice.
fn sum_block_range(block_sizes: &[u32], offset: u32, count: u32) -> Result<u64> {
    let start = offset as usize;
    let end = start.saturating_add(count as usize);
    let slice = block_sizes.get(start..end).ok_or(PsarcError::Truncated {
        needed: end,
        available: block_sizes.len(),
    })?;
    Ok(slice.iter().map(|&b| b as u64).sum())
}

fn to_toc_entry(entry: &Entry) -> TocEntry {
    TocEntry {
        name_digest: entry.name_digest,
        block_offset: entry.block_offset,
        uncompressed_size: entry.uncompressed_size,
        file_offset: entry.file_offset,
    }
}

/// Seeks to `entry`'s first block and decompresses every block of its
/// payload in sequence.
fn read_entry_payload(
    file: &mut File,
    entry: &TocEntry,
    block_offset: u32,
    block_sizes: &[u32],
    path_for_errors: &std::path::Path,
) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(entry.file_offset)).map_err(|source| PsarcError::IoSeek {
        path: path_for_errors.to_path_buf(),
        source,
    })?;

    let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
    let mut remaining = entry.uncompressed_size;
    let mut idx = block_offset as usize;
    while remaining > 0 {
        let compressed_len = *block_sizes.get(idx).ok_or(PsarcError::Truncated {
            needed: idx + 1,
            available: block_sizes.len(),
        })? as usize;
        let mut compressed = vec![0u8; compressed_len];
        file.read_exact(&mut compressed).map_err(|source| PsarcError::IoRead {
            path: path_for_errors.to_path_buf(),
            source,
        })?;
        let decompressed = decompress_block(&compressed)?;
        let take = decompressed.len().min(remaining as usize);
        out.extend_from_slice(&decompressed[..take]);
        remaining -= take as u64;
        idx += 1;
    }
    Ok(out)
}

/// Resolves `archive_path` to an absolute form before a `source_dir`/
/// `target_dir` chdir, so the archive remains reachable afterwards.
pub fn resolve_archive_path(archive_path: &std::path::Path) -> PathBuf {
    use path_absolutize::Absolutize;
    archive_path
        .absolutize()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| archive_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Compression, Config};
    use crate::packer::pack;
    use crate::path::PathSet;
    use crate::reporter::RecordingReporter;
    use tempfile::TempDir;

    fn pack_fixture(dir: &TempDir, compression: Compression) -> std::path::PathBuf {
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        std::fs::write(dir.path().join("b.bin"), (0u16..256).map(|n| n as u8).collect::<Vec<u8>>()).unwrap();
        let mut set = PathSet::new();
        set.add(dir.path().join("a.txt"));
        set.add(dir.path().join("b.bin"));
        let archive = dir.path().join("out.psarc");
        let config = Config::builder(&archive)
            .compression(compression)
            .num_threads(1)
            .build()
            .unwrap();
        let mut reporter = RecordingReporter::default();
        pack(&set, &config, &mut reporter).unwrap();
        archive
    }

    #[test]
    fn opens_and_lists_packed_archive() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);
        let archive = Archive::open(&archive_path).unwrap();
        assert_eq!(archive.entries.len(), 2);
        assert_eq!(archive.entries[0].stored_path, "a.txt");
        assert_eq!(archive.entries[0].uncompressed_size, 6);
        assert_eq!(archive.entries[1].stored_path, "b.bin");
        assert_eq!(archive.entries[1].uncompressed_size, 256);
    }

    #[test]
    fn extracts_round_trip_bytes() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Zlib);
        let archive = Archive::open(&archive_path).unwrap();

        let extract_dir = TempDir::new().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(extract_dir.path()).unwrap();
        let config = Config::builder(&archive_path).overwrite(true).build().unwrap();
        let mut reporter = RecordingReporter::default();
        let result = extract(&archive, &archive_path, &[], &config, &mut reporter);
        std::env::set_current_dir(cwd).unwrap();
        result.unwrap();

        let a = std::fs::read(extract_dir.path().join("a.txt")).unwrap();
        assert_eq!(a, b"hello\n");
        let b = std::fs::read(extract_dir.path().join("b.bin")).unwrap();
        assert_eq!(b, (0u16..256).map(|n| n as u8).collect::<Vec<u8>>());
    }

    #[test]
    fn extract_filter_selects_one_entry() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);
        let archive = Archive::open(&archive_path).unwrap();

        let extract_dir = TempDir::new().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(extract_dir.path()).unwrap();
        let config = Config::builder(&archive_path).overwrite(true).build().unwrap();
        let mut reporter = RecordingReporter::default();
        let result = extract(&archive, &archive_path, &["a.txt".to_string()], &config, &mut reporter);
        std::env::set_current_dir(cwd).unwrap();
        result.unwrap();

        assert!(extract_dir.path().join("a.txt").exists());
        assert!(!extract_dir.path().join("b.bin").exists());
    }

    #[test]
    fn existing_output_without_overwrite_reports_exists() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);
        let archive = Archive::open(&archive_path).unwrap();

        let extract_dir = TempDir::new().unwrap();
        std::fs::write(extract_dir.path().join("a.txt"), b"pre-existing").unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(extract_dir.path()).unwrap();
        let config = Config::builder(&archive_path).build().unwrap();
        let mut reporter = RecordingReporter::default();
        let result = extract(&archive, &archive_path, &["a.txt".to_string()], &config, &mut reporter);
        std::env::set_current_dir(cwd).unwrap();
        result.unwrap();

        assert!(reporter.events.iter().any(|e| e.contains("Exists")));
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.psarc");
        std::fs::write(&bad, b"not a psarc file at all").unwrap();
        assert!(matches!(Archive::open(&bad), Err(PsarcError::BadMagic)));
    }

    /// A crafted TOC entry claiming an `uncompressed_size` far beyond what
    /// the block table backs must fail with `Truncated`, not panic on an
    /// out-of-bounds slice index.
    #[test]
    fn oversized_uncompressed_size_in_toc_fails_truncated_not_panic() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);

        let mut bytes = std::fs::read(&archive_path).unwrap();
        // TOC entry 1 (the first file, after the manifest at entry 0) starts
        // at HEADER_SIZE + TOC_ENTRY_SIZE; its uncompressed_size is the
        // 40-bit field at offset 20 within the entry.
        let entry1_start = HEADER_SIZE + TOC_ENTRY_SIZE as usize;
        let size_field = &mut bytes[entry1_start + 20..entry1_start + 25];
        crate::byteorder::write_u40(size_field, 0xFF_FFFF_FFFF);
        std::fs::write(&archive_path, &bytes).unwrap();

        assert!(matches!(Archive::open(&archive_path), Err(PsarcError::Truncated { .. })));
    }

    /// Same shape of attack via `block_offset` pointing past the end of a
    /// short block table, rather than via an inflated `uncompressed_size`.
    #[test]
    fn out_of_range_block_offset_in_toc_fails_truncated_not_panic() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);

        let mut bytes = std::fs::read(&archive_path).unwrap();
        let entry1_start = HEADER_SIZE + TOC_ENTRY_SIZE as usize;
        let offset_field = &mut bytes[entry1_start + 16..entry1_start + 20];
        crate::byteorder::write_u32(offset_field, 0xFFFF_FF00);
        std::fs::write(&archive_path, &bytes).unwrap();

        assert!(matches!(Archive::open(&archive_path), Err(PsarcError::Truncated { .. })));
    }

    #[test]
    fn info_includes_manifest_row_in_totals() {
        let dir = TempDir::new().unwrap();
        let archive_path = pack_fixture(&dir, Compression::Store);
        let archive = Archive::open(&archive_path).unwrap();

        assert_eq!(archive.manifest_uncompressed_size, "a.txt\nb.bin".len() as u64);

        let mut captured = None;
        let mut reporter = TotalsCapture(&mut captured);
        archive.info("out.psarc", &mut reporter);

        let totals = captured.unwrap();
        let files_total: u64 = archive.entries.iter().map(|e| e.uncompressed_size).sum();
        assert_eq!(totals.files, archive.entries.len() as u64);
        assert_eq!(totals.uncompressed_size, files_total + archive.manifest_uncompressed_size);
    }

    struct TotalsCapture<'a>(&'a mut Option<Totals>);
    impl Reporter for TotalsCapture<'_> {
        fn open(&mut self, _kind: Kind, _archive_name: &str) {}
        fn open_file_section(&mut self) {}
        fn open_file_item(&mut self, _record: &FileRecord) {}
        fn close_file_item(&mut self, _uncompressed: u64, _compressed: u64, _status: Status, _more_follow: bool) {}
        fn close_file_section(&mut self) {}
        fn close(&mut self, totals: Totals) {
            *self.0 = Some(totals);
        }
        fn error(&mut self, _message: &str) {}
    }
}
