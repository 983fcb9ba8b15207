//! Format-agnostic progress reporting.
//!
//! The packer and unpacker never format a string for human consumption; they
//! report raw values through this trait and let the implementation render
//! them as plain text, JSON, CSV, or whatever else a caller wants. This is
//! deliberately distinct from the `log`-facing diagnostic trace used
//! elsewhere in this crate, which is for developers, not end users.

/// Which top-level operation is being reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Pack,
    Unpack,
    List,
    Info,
}

/// How one file's operation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Skipped,
    Exists,
    Fail,
}

/// The raw values a reporter needs to describe one TOC entry as work on it
/// begins.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub stored_path: String,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

/// Aggregate totals emitted once, at the end of an operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub files: u64,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub errors: u64,
}

/// A narrow sink for pack/unpack/list/info progress events.
///
/// Every method takes raw values; none of them return a `Result` because a
/// reporting failure (e.g. a broken pipe on stdout) must never abort the
/// underlying archive operation — implementations that care should swallow
/// their own I/O errors internally.
pub trait Reporter {
    fn open(&mut self, kind: Kind, archive_name: &str);
    fn open_file_section(&mut self);
    fn open_file_item(&mut self, record: &FileRecord);
    fn close_file_item(
        &mut self,
        uncompressed: u64,
        compressed: u64,
        status: Status,
        more_follow: bool,
    );
    fn close_file_section(&mut self);
    fn close(&mut self, totals: Totals);
    fn error(&mut self, message: &str);
}

/// A minimal plain-text [`Reporter`], the only renderer this crate ships.
/// JSON/CSV/XML rendering is left to external callers, per the reporter's
/// explicit separation from core logic.
pub struct PlainReporter {
    archive_name: String,
    kind: Kind,
    /// Mirrors `Config::verbose` (§4.K): when set, pack/unpack items also
    /// print their byte counts instead of just the stored path. List/Info
    /// always show sizes regardless of this flag.
    verbose: bool,
}

impl PlainReporter {
    pub fn new() -> Self {
        PlainReporter {
            archive_name: String::new(),
            kind: Kind::List,
            verbose: false,
        }
    }

    pub fn with_verbose(verbose: bool) -> Self {
        PlainReporter {
            verbose,
            ..PlainReporter::new()
        }
    }
}

impl Default for PlainReporter {
    fn default() -> Self {
        PlainReporter::new()
    }
}

impl Reporter for PlainReporter {
    fn open(&mut self, kind: Kind, archive_name: &str) {
        self.kind = kind;
        self.archive_name = archive_name.to_string();
        let verb = match kind {
            Kind::Pack => "Creating",
            Kind::Unpack => "Extracting",
            Kind::List => "Listing",
            Kind::Info => "Inspecting",
        };
        println!("{verb} {archive_name}");
    }

    fn open_file_section(&mut self) {}

    fn open_file_item(&mut self, record: &FileRecord) {
        if self.kind == Kind::List || self.kind == Kind::Info || self.verbose {
            println!(
                "{:>12}  {:>12}  {}",
                record.uncompressed_size, record.compressed_size, record.stored_path
            );
        } else {
            println!("  {}", record.stored_path);
        }
    }

    fn close_file_item(&mut self, _uncompressed: u64, _compressed: u64, status: Status, _more_follow: bool) {
        match status {
            Status::Ok => {}
            Status::Skipped => println!("    skipped (exists)"),
            Status::Exists => println!("    failed: already exists"),
            Status::Fail => println!("    failed"),
        }
    }

    fn close_file_section(&mut self) {}

    fn close(&mut self, totals: Totals) {
        println!(
            "{} file(s), {} -> {} bytes, {} error(s)",
            totals.files, totals.uncompressed_size, totals.compressed_size, totals.errors
        );
    }

    fn error(&mut self, message: &str) {
        eprintln!("error: {message}");
    }
}

/// Reporter that records every invocation in memory, for tests that need to
/// assert on event ordering without capturing stdout.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<String>,
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn open(&mut self, kind: Kind, archive_name: &str) {
        self.events.push(format!("open({kind:?}, {archive_name})"));
    }
    fn open_file_section(&mut self) {
        self.events.push("open_file_section".into());
    }
    fn open_file_item(&mut self, record: &FileRecord) {
        self.events.push(format!("open_file_item({})", record.stored_path));
    }
    fn close_file_item(&mut self, uncompressed: u64, compressed: u64, status: Status, more_follow: bool) {
        self.events.push(format!(
            "close_file_item({uncompressed}, {compressed}, {status:?}, {more_follow})"
        ));
    }
    fn close_file_section(&mut self) {
        self.events.push("close_file_section".into());
    }
    fn close(&mut self, totals: Totals) {
        self.events.push(format!("close({})", totals.files));
    }
    fn error(&mut self, message: &str) {
        self.events.push(format!("error({message})"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reporter_defaults_to_non_verbose() {
        assert!(!PlainReporter::new().verbose);
        assert!(PlainReporter::with_verbose(true).verbose);
    }

    #[test]
    fn recording_reporter_captures_event_order() {
        let mut r = RecordingReporter::default();
        r.open(Kind::Pack, "out.psarc");
        r.open_file_section();
        r.open_file_item(&FileRecord {
            stored_path: "a.txt".into(),
            uncompressed_size: 10,
            compressed_size: 8,
        });
        r.close_file_item(10, 8, Status::Ok, true);
        r.close_file_section();
        r.close(Totals {
            files: 1,
            uncompressed_size: 10,
            compressed_size: 8,
            errors: 0,
        });
        assert_eq!(
            r.events,
            vec![
                "open(Pack, out.psarc)",
                "open_file_section",
                "open_file_item(a.txt)",
                "close_file_item(10, 8, Ok, true)",
                "close_file_section",
                "close(1)",
            ]
        );
    }
}
