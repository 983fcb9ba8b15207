//! The one place that maps between on-disk input paths, stored (manifest)
//! paths, and extraction output paths.
//!
//! Packing and unpacking each call exactly one function here instead of
//! open-coding the flag logic at every call site.

use std::path::{Path, PathBuf};

/// Derives the stored (manifest) path for one input file, given the
/// archive's `trim_path` setting and whether it declares `ABSOLUTE_PATHS`.
///
/// Order of operations, per entry:
/// 1. Normalize to `/` separators (strips a Windows drive prefix if present).
/// 2. If `trim_path`, keep only the final component.
/// 3. If `absolute_paths`, ensure a leading `/`; otherwise strip all leading
///    `/`s.
pub fn stored_path(input: &Path, trim_path: bool, absolute_paths: bool) -> String {
    let mut s = to_forward_slashes(input);

    if trim_path {
        s = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(s);
    }

    if absolute_paths {
        if !s.starts_with('/') {
            s.insert(0, '/');
        }
    } else {
        while s.starts_with('/') {
            s.remove(0);
        }
    }
    s
}

/// Derives the extraction output path for a stored path, relative to the
/// current directory.
///
/// When `trim_path` is set, every entry lands directly in the current
/// directory under its basename (matching the packer's own `trim_path`
/// behavior, so a round trip through `trim_path` on both ends is
/// idempotent). Otherwise the full directory hierarchy implied by the
/// stored path is recreated under the current directory.
pub fn output_path(stored: &str, trim_path: bool) -> PathBuf {
    if trim_path {
        let base = stored.rsplit('/').next().unwrap_or(stored);
        return PathBuf::from(base);
    }
    let relative = stored.trim_start_matches('/');
    PathBuf::from(relative)
}

/// Strips a Windows drive prefix (`C:`) if present and rewrites `\` to `/`.
///
/// The drive-prefix strip is Windows-only (a leading `letter:` is a real,
/// driveless filename on every other platform); the `\`→`/` rewrite applies
/// everywhere per the format's `/`-separator requirement.
fn to_forward_slashes(input: &Path) -> String {
    let raw = input.to_string_lossy();
    let without_drive = strip_windows_drive(&raw);
    without_drive.replace('\\', "/")
}

#[cfg(windows)]
fn strip_windows_drive(raw: &str) -> &str {
    raw.strip_prefix(|c: char| c.is_ascii_alphabetic())
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(raw)
}

#[cfg(not(windows))]
fn strip_windows_drive(raw: &str) -> &str {
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strips_leading_slash() {
        let p = stored_path(Path::new("/home/user/file.txt"), false, false);
        assert_eq!(p, "home/user/file.txt");
    }

    #[test]
    fn absolute_paths_adds_leading_slash() {
        let p = stored_path(Path::new("home/user/file.txt"), false, true);
        assert_eq!(p, "/home/user/file.txt");
    }

    #[test]
    fn trim_path_keeps_only_basename() {
        let p = stored_path(Path::new("dir1/sub/x.txt"), true, false);
        assert_eq!(p, "x.txt");
    }

    #[test]
    fn trim_path_and_absolute_compose() {
        let p = stored_path(Path::new("dir1/sub/x.txt"), true, true);
        assert_eq!(p, "/x.txt");
    }

    #[test]
    #[cfg(windows)]
    fn windows_drive_prefix_is_stripped() {
        let s = to_forward_slashes(Path::new("C:\\Users\\me\\file.txt"));
        assert_eq!(s, "/Users/me/file.txt");
    }

    /// Off Windows, a leading `letter:` is just a filename, not a drive
    /// prefix — it must survive untouched (only backslashes are rewritten).
    #[test]
    #[cfg(not(windows))]
    fn drive_like_prefix_is_kept_on_non_windows() {
        let s = to_forward_slashes(Path::new("C:\\Users\\me\\file.txt"));
        assert_eq!(s, "C:/Users/me/file.txt");
    }

    #[test]
    fn output_path_recreates_hierarchy() {
        let p = output_path("home/user/file.txt", false);
        assert_eq!(p, PathBuf::from("home/user/file.txt"));
    }

    #[test]
    fn output_path_trim_path_uses_basename_only() {
        let p = output_path("dir1/x.txt", true);
        assert_eq!(p, PathBuf::from("x.txt"));
    }

    #[test]
    fn output_path_strips_leading_slash_for_join_safety() {
        let p = output_path("/etc/passwd", false);
        assert_eq!(p, PathBuf::from("etc/passwd"));
    }

    #[test]
    fn trim_path_round_trips_matching_basenames() {
        let a = stored_path(Path::new("dir1/x"), true, false);
        let b = stored_path(Path::new("dir2/x"), true, false);
        assert_eq!(a, "x");
        assert_eq!(b, "x");
        assert_eq!(output_path(&a, true), output_path(&b, true));
    }
}
