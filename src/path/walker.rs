//! Expands shell-style glob patterns into a [`PathSet`].
//!
//! Directory traversal (when `recursive` is set) reuses the same depth-first,
//! symlink-free `walkdir` pattern the rest of this crate's ancestry uses for
//! file-list expansion.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions};
use walkdir::WalkDir;

use crate::error::{PsarcError, Result};
use crate::path::pathset::PathSet;

/// Expands `patterns` (glob syntax: `*`, `?`, `[...]`, `{...}`, and a leading
/// `~`) into an ordered, duplicate-suppressed [`PathSet`].
///
/// Matched directories are walked depth-first in directory-entry order when
/// `recursive` is set; otherwise they are silently skipped (a bare directory
/// match with no recursion contributes no files). `ignore_case` makes the
/// glob match case-insensitively while leaving the matched filename's actual
/// case untouched.
pub fn walk(patterns: &[String], recursive: bool, ignore_case: bool) -> Result<PathSet> {
    let options = MatchOptions {
        case_sensitive: !ignore_case,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut set = PathSet::new();
    for pattern in patterns {
        for brace_expanded in expand_braces(pattern) {
            let expanded = expand_tilde(&brace_expanded);
            let matches = glob_with(&expanded, options)
                .map_err(|e| PsarcError::Usage(format!("bad glob pattern {pattern:?}: {e}")))?;

            let mut any = false;
            for entry in matches {
                any = true;
                let path = entry
                    .map_err(|e| PsarcError::Usage(format!("glob error on {pattern:?}: {e}")))?;
                add_match(&mut set, &path, recursive);
            }
            if !any {
                // Glob matched nothing on disk; fall through and let the caller
                // decide whether a literal (non-glob) path still resolves.
                let literal = PathBuf::from(&expanded);
                if literal.exists() {
                    add_match(&mut set, &literal, recursive);
                }
            }
        }
    }
    Ok(set)
}

/// Expands a single `{a,b,c}` group into one pattern per alternative, the
/// way a shell would before handing the result to the glob matcher (the
/// `glob` crate itself has no brace syntax). Only one, non-nested group is
/// supported — enough for the `dir/{a,b}/*.txt`-style patterns PSARC
/// command lines actually use. A pattern with no braces expands to itself.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close_rel) = pattern[open..].find('}') else {
        return vec![pattern.to_string()];
    };
    let close = open + close_rel;
    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];
    body.split(',')
        .map(|alt| format!("{prefix}{alt}{suffix}"))
        .collect()
}

fn add_match(set: &mut PathSet, path: &Path, recursive: bool) {
    if path.is_dir() {
        if !recursive {
            return;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let Ok(entry) = entry else { continue };
            if entry.file_type().is_file() {
                set.add(entry.path());
            }
        }
    } else if path.is_file() {
        set.add(path);
    }
}

fn expand_tilde(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs::home_dir() {
                return format!("{}{}", home.display(), rest);
            }
        }
    }
    pattern.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/b.txt"), b"b").unwrap();
        dir
    }

    #[test]
    fn glob_matches_flat_files() {
        let dir = make_tree();
        let pattern = dir.path().join("*.txt").to_string_lossy().to_string();
        let set = walk(&[pattern], false, false).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn recursive_walks_matched_directory() {
        let dir = make_tree();
        let pattern = dir.path().to_string_lossy().to_string();
        let set = walk(&[pattern], true, false).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn non_recursive_directory_match_contributes_nothing() {
        let dir = make_tree();
        let pattern = dir.path().to_string_lossy().to_string();
        let set = walk(&[pattern], false, false).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn literal_path_without_glob_metachars_resolves() {
        let dir = make_tree();
        let file = dir.path().join("a.txt").to_string_lossy().to_string();
        let set = walk(&[file], false, false).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            let expanded = expand_tilde("~/foo");
            assert_eq!(expanded, format!("{}/foo", home.display()));
        }
    }

    #[test]
    fn bare_tilde_expands_to_home_dir_itself() {
        if let Some(home) = dirs::home_dir() {
            let expanded = expand_tilde("~");
            assert_eq!(expanded, home.display().to_string());
        }
    }

    #[test]
    fn brace_group_expands_to_one_pattern_per_alternative() {
        let expanded = expand_braces("dir/{a,b,c}/*.txt");
        assert_eq!(expanded, vec!["dir/a/*.txt", "dir/b/*.txt", "dir/c/*.txt"]);
    }

    #[test]
    fn pattern_without_braces_is_unchanged() {
        assert_eq!(expand_braces("*.txt"), vec!["*.txt"]);
    }

    #[test]
    fn brace_group_resolves_matching_files() {
        let dir = make_tree();
        let pattern = format!("{}/{{a,missing}}.txt", dir.path().display());
        let set = walk(&[pattern], false, false).unwrap();
        assert_eq!(set.len(), 1);
    }
}
