//! Plain `*`/`**` path glob expansion. No regex: matching is a small
//! segment-by-segment recursive function, which is all this grammar needs.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Matches a single path segment against a pattern segment containing `*`
/// wildcards (but not `**`, which is handled one level up).
fn segment_matches(pattern: &str, segment: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == segment;
    }

    let mut rest = segment;
    for (idx, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if idx == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if idx == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Matches a full path (as `/`-joined segments relative to the glob root)
/// against the pattern's segments, with `**` matching zero or more whole
/// path segments.
fn path_matches(pattern_segments: &[&str], path_segments: &[&str]) -> bool {
    match pattern_segments.split_first() {
        None => path_segments.is_empty(),
        Some((head, rest_pattern)) if *head == "**" => {
            if path_matches(rest_pattern, path_segments) {
                return true;
            }
            match path_segments.split_first() {
                Some((_, rest_path)) => path_matches(pattern_segments, rest_path),
                None => false,
            }
        }
        Some((head, rest_pattern)) => match path_segments.split_first() {
            Some((first, rest_path)) if segment_matches(head, first) => {
                path_matches(rest_pattern, rest_path)
            }
            _ => false,
        },
    }
}

/// Expands `pattern` (relative, forward-slash separated) against `root`.
/// A pattern with no `*` at all is treated as a literal path and returned
/// as-is if it exists; a pattern whose glob segments match nothing expands
/// to an empty list rather than erroring.
pub fn expand(root: &Path, pattern: &str) -> Vec<PathBuf> {
    if !pattern.contains('*') {
        let candidate = root.join(pattern);
        return if candidate.exists() {
            vec![candidate]
        } else {
            Vec::new()
        };
    }

    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut matches = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path_segments: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if path_matches(&pattern_segments, &path_segments) {
            matches.push(entry.path().to_path_buf());
        }
    }

    matches.sort();
    matches
}

/// Directory-matching counterpart to [`expand`], used by workspace member
/// discovery (`workspace.members` patterns name directories, not files).
/// A literal (non-glob) pattern that names an existing directory is
/// returned as-is; a glob whose segments match nothing expands to an empty
/// list rather than erroring, per §4.1's "non-matching globs are silently
/// empty".
pub fn expand_dirs(root: &Path, pattern: &str) -> Vec<PathBuf> {
    if !pattern.contains('*') {
        let candidate = root.join(pattern);
        return if candidate.is_dir() {
            vec![candidate]
        } else {
            Vec::new()
        };
    }

    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut matches = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_dir() || entry.path() == root {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path_segments: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if path_matches(&pattern_segments, &path_segments) {
            matches.push(entry.path().to_path_buf());
        }
    }

    matches.sort();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn literal_pattern_matches_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Cargo.toml");
        let found = expand(dir.path(), "Cargo.toml");
        assert_eq!(found, vec![dir.path().join("Cargo.toml")]);
    }

    #[test]
    fn single_star_matches_one_segment() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "src/nested/deep.rs");
        let found = expand(dir.path(), "src/*.rs");
        assert_eq!(found, vec![dir.path().join("src/lib.rs")]);
    }

    #[test]
    fn double_star_matches_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "src/nested/deep.rs");
        touch(dir.path(), "README.md");
        let mut found = expand(dir.path(), "src/**/*.rs");
        found.sort();
        assert_eq!(
            found,
            vec![
                dir.path().join("src/lib.rs"),
                dir.path().join("src/nested/deep.rs"),
            ]
        );
    }

    #[test]
    fn non_matching_glob_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        assert!(expand(dir.path(), "docs/**/*.md").is_empty());
    }
}

#[cfg(test)]
mod dir_tests {
    use super::*;
    use std::fs;

    fn mkdir(dir: &Path, rel: &str) {
        fs::create_dir_all(dir.join(rel)).unwrap();
    }

    #[test]
    fn single_star_matches_member_directories() {
        let dir = tempfile::tempdir().unwrap();
        mkdir(dir.path(), "packages/api");
        mkdir(dir.path(), "packages/web");
        mkdir(dir.path(), "packages/web/src");
        let mut found = expand_dirs(dir.path(), "packages/*");
        found.sort();
        assert_eq!(
            found,
            vec![dir.path().join("packages/api"), dir.path().join("packages/web")]
        );
    }

    #[test]
    fn literal_directory_pattern_matches_exact_dir() {
        let dir = tempfile::tempdir().unwrap();
        mkdir(dir.path(), "services/core");
        let found = expand_dirs(dir.path(), "services/core");
        assert_eq!(found, vec![dir.path().join("services/core")]);
    }

    #[test]
    fn non_matching_glob_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        mkdir(dir.path(), "packages/api");
        assert!(expand_dirs(dir.path(), "apps/*").is_empty());
    }
}
