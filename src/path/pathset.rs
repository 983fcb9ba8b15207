//! Duplicate-suppressing ordered container of input paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;

/// An ordered, duplicate-suppressing collection of input paths.
///
/// Insertion order is preserved and becomes TOC order at pack time.
/// Deduplication is keyed on each path's canonical absolute form, but the
/// *original* (only dot-cleaned) path is what gets stored — two different
/// relative spellings of the same file collapse to one entry, keeping
/// whichever was added first.
#[derive(Debug, Default, Clone)]
pub struct PathSet {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl PathSet {
    pub fn new() -> Self {
        PathSet::default()
    }

    /// Attempts to add `path`. Returns `true` if it was newly added, `false`
    /// if its canonical form was already present (a duplicate).
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let canonical = canonical_form(path);
        if !self.seen.insert(canonical) {
            return false;
        }
        let cleaned = clean_dots(path);
        let stored = if escapes_root(&cleaned) {
            canonical_form(&cleaned)
        } else {
            cleaned
        };
        self.paths.push(stored);
        true
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.paths
    }
}

/// Absolute, lexically-resolved form of `path`, used only as a dedup key.
/// Does not touch the filesystem and does not resolve symlinks.
fn canonical_form(path: &Path) -> PathBuf {
    path.absolutize()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Removes every `./` occurring at the start of the path or immediately
/// after a `/`. Leaves `..` segments untouched.
fn clean_dots(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut at_segment_start = true;
    while let Some(c) = chars.next() {
        if at_segment_start && c == '.' && chars.peek() == Some(&'/') {
            chars.next(); // consume the '/'
            continue;
        }
        out.push(c);
        at_segment_start = c == '/';
    }
    PathBuf::from(out)
}

/// True if the cleaned path would climb above the archive's intended root:
/// a leading `../` or any embedded `/../` segment.
fn escapes_root(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.starts_with("../") || s == ".." || s.contains("/../") || s.ends_with("/..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_by_canonical_form() {
        let mut set = PathSet::new();
        assert!(set.add("/tmp/a/../a/file.txt"));
        assert!(!set.add("/tmp/a/file.txt"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn preserves_first_insertion_order() {
        let mut set = PathSet::new();
        set.add("b.txt");
        set.add("a.txt");
        set.add("b.txt");
        let v: Vec<_> = set.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(v, vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn cleans_leading_dot_slash() {
        let mut set = PathSet::new();
        set.add("./sub/./file.txt");
        let v: Vec<_> = set.iter().collect();
        assert_eq!(v[0], &PathBuf::from("sub/file.txt"));
    }

    #[test]
    fn does_not_collapse_dot_dot() {
        let cleaned = clean_dots(Path::new("a/../b.txt"));
        assert_eq!(cleaned, PathBuf::from("a/../b.txt"));
    }

    #[test]
    fn escaping_path_is_stored_canonical() {
        let mut set = PathSet::new();
        set.add("../outside.txt");
        let v: Vec<_> = set.iter().collect();
        assert!(v[0].is_absolute());
    }

    #[test]
    fn non_escaping_relative_path_kept_relative() {
        let mut set = PathSet::new();
        set.add("sub/file.txt");
        let v: Vec<_> = set.iter().collect();
        assert_eq!(v[0], &PathBuf::from("sub/file.txt"));
    }
}
