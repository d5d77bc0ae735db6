//! Component D: Affected-Set Analyzer. Diffs the working tree against a
//! base revision via `git diff --name-only`, maps changed paths onto
//! workspace members, and optionally closes over transitive dependents.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ZrError;

#[derive(Debug, Clone)]
pub struct WorkspaceMember {
    pub name: String,
    pub path: PathBuf,
}

/// Walks upward from `start` looking for a `.git` directory. Used to decide
/// whether `--affected` is even meaningful here.
fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(".git").exists() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

/// Runs `git diff --name-only <base>` from `repo_root` and returns the
/// changed paths, relative to `repo_root`. `NoRepo` is returned whenever no
/// `.git` directory is found on the way up from `repo_root`; callers decide
/// whether that's fatal or a fallback-to-all-members warning, per §7.
pub fn changed_paths(repo_root: &Path, base: &str) -> Result<Vec<PathBuf>, ZrError> {
    if find_repo_root(repo_root).is_none() {
        return Err(ZrError::NoRepo);
    }

    let output = Command::new("git")
        .arg("diff")
        .arg("--name-only")
        .arg(base)
        .current_dir(repo_root)
        .output()?;

    if !output.status.success() {
        return Err(ZrError::NoRepo);
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Maps each changed path to the deepest workspace member whose path is a
/// prefix of it. A path not under any member is silently dropped (it isn't
/// anyone's responsibility to rebuild).
pub fn directly_affected(
    members: &[WorkspaceMember],
    changed: &[PathBuf],
) -> BTreeSet<String> {
    let mut affected = BTreeSet::new();
    for changed_path in changed {
        let mut best: Option<&WorkspaceMember> = None;
        for member in members {
            if changed_path.starts_with(&member.path) {
                let is_deeper = best
                    .map(|b| member.path.components().count() > b.path.components().count())
                    .unwrap_or(true);
                if is_deeper {
                    best = Some(member);
                }
            }
        }
        if let Some(member) = best {
            affected.insert(member.name.clone());
        }
    }
    affected
}

/// Closes `directly_affected` over the reverse of `member_depends_on`
/// (if A depends on B and B changed, A is a transitive dependent of B).
pub fn close_over_dependents(
    member_depends_on: &BTreeMap<String, Vec<String>>,
    directly_affected: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut reverse: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (member, deps) in member_depends_on {
        for dep in deps {
            reverse.entry(dep.as_str()).or_default().push(member.as_str());
        }
    }

    let mut closed: BTreeSet<String> = directly_affected.clone();
    let mut queue: VecDeque<String> = directly_affected.iter().cloned().collect();
    while let Some(name) = queue.pop_front() {
        if let Some(dependents) = reverse.get(name.as_str()) {
            for dependent in dependents {
                if closed.insert((*dependent).to_string()) {
                    queue.push_back((*dependent).to_string());
                }
            }
        }
    }
    closed
}

/// Full `--affected` computation: directly-affected members, optionally
/// widened with `--include-dependents`, optionally narrowed with
/// `--exclude-self`.
pub fn affected_set(
    repo_root: &Path,
    base: &str,
    members: &[WorkspaceMember],
    member_depends_on: &BTreeMap<String, Vec<String>>,
    include_dependents: bool,
    exclude_self: bool,
) -> Result<BTreeSet<String>, ZrError> {
    let changed = changed_paths(repo_root, base)?;
    let direct = directly_affected(members, &changed);

    let result = if include_dependents {
        close_over_dependents(member_depends_on, &direct)
    } else {
        direct.clone()
    };

    Ok(if exclude_self {
        result.difference(&direct).cloned().collect()
    } else {
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, path: &str) -> WorkspaceMember {
        WorkspaceMember {
            name: name.to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn maps_changed_path_to_deepest_member() {
        let members = vec![member("root", ""), member("api", "services/api")];
        let changed = vec![PathBuf::from("services/api/src/main.rs")];
        let affected = directly_affected(&members, &changed);
        assert_eq!(affected, BTreeSet::from(["api".to_string()]));
    }

    #[test]
    fn closes_over_transitive_dependents() {
        let mut deps = BTreeMap::new();
        deps.insert("app".to_string(), vec!["lib".to_string()]);
        deps.insert("lib".to_string(), vec!["core".to_string()]);
        let direct = BTreeSet::from(["core".to_string()]);
        let closed = close_over_dependents(&deps, &direct);
        assert_eq!(
            closed,
            BTreeSet::from(["core".to_string(), "lib".to_string(), "app".to_string()])
        );
    }

    #[test]
    fn exclude_self_leaves_only_dependents() {
        let mut deps = BTreeMap::new();
        deps.insert("app".to_string(), vec!["lib".to_string()]);
        let direct = BTreeSet::from(["lib".to_string()]);
        let closed = close_over_dependents(&deps, &direct);
        let excluded: BTreeSet<String> = closed.difference(&direct).cloned().collect();
        assert_eq!(excluded, BTreeSet::from(["app".to_string()]));
    }

    #[test]
    fn no_repo_without_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = changed_paths(dir.path(), "HEAD").unwrap_err();
        assert!(matches!(err, ZrError::NoRepo));
    }
}
