//! Workspace member discovery: expands `workspace.members` patterns into
//! concrete member directories, loads each member's own `zr.toml` (if any),
//! and exposes the `depends_on` edges the Affected-Set Analyzer closes over.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{loader, Config};
use crate::constants::CONFIG_FILENAME;
use crate::core::affected::WorkspaceMember;
use crate::core::glob;
use crate::error::ZrError;

#[derive(Debug, Clone)]
pub struct Member {
    /// Directory base name; the namespace prefix for this member's tasks
    /// under `workspace run`/`workspace list`.
    pub name: String,
    pub path: PathBuf,
    /// `None` when the member directory has no `zr.toml` of its own (it
    /// still counts as an affected-set target, just contributes no tasks).
    pub config: Option<Config>,
}

/// Expands `config.workspace.members` (literal paths first, then globs)
/// into concrete, deduplicated member directories, each paired with its
/// own config if present. Non-matching globs silently contribute nothing.
pub fn discover(config: &Config) -> Result<Vec<Member>, ZrError> {
    let Some(workspace) = &config.workspace else {
        return Ok(Vec::new());
    };

    let mut seen = std::collections::BTreeSet::new();
    let mut members = Vec::new();

    for pattern in &workspace.members {
        for path in glob::expand_dirs(&config.root, pattern) {
            if !seen.insert(path.clone()) {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());

            let member_config_path = path.join(CONFIG_FILENAME);
            let member_config = if member_config_path.is_file() {
                Some(loader::load(&member_config_path)?)
            } else {
                None
            };

            members.push(Member {
                name,
                path,
                config: member_config,
            });
        }
    }

    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

/// Converts discovered members into the plain `(name, path)` shape the
/// Affected-Set Analyzer operates over, relative to `root`.
pub fn as_affected_members(root: &std::path::Path, members: &[Member]) -> Vec<WorkspaceMember> {
    members
        .iter()
        .map(|m| WorkspaceMember {
            name: m.name.clone(),
            path: m.path.strip_prefix(root).unwrap_or(&m.path).to_path_buf(),
        })
        .collect()
}

/// Member-declared dependency edges (`[workspace] depends_on = [...]` in
/// each member's own config), keyed by member name, for
/// `close_over_dependents`.
pub fn depends_on_map(members: &[Member]) -> BTreeMap<String, Vec<String>> {
    members
        .iter()
        .map(|m| {
            let deps = m
                .config
                .as_ref()
                .and_then(|c| c.workspace.as_ref())
                .map(|w| w.depends_on.clone())
                .unwrap_or_default();
            (m.name.clone(), deps)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &std::path::Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_members_with_and_without_their_own_config() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(CONFIG_FILENAME),
            "[workspace]\nmembers = [\"packages/*\"]\n",
        );
        write_file(
            &dir.path().join("packages/api").join(CONFIG_FILENAME),
            "[tasks.build]\ncmd = \"echo api\"\n",
        );
        std::fs::create_dir_all(dir.path().join("packages/web")).unwrap();

        let root_config = loader::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        let members = discover(&root_config).unwrap();

        assert_eq!(members.len(), 2);
        let api = members.iter().find(|m| m.name == "api").unwrap();
        assert!(api.config.is_some());
        let web = members.iter().find(|m| m.name == "web").unwrap();
        assert!(web.config.is_none());
    }

    #[test]
    fn depends_on_map_reads_member_declared_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(CONFIG_FILENAME),
            "[workspace]\nmembers = [\"packages/*\"]\n",
        );
        write_file(
            &dir.path().join("packages/app").join(CONFIG_FILENAME),
            "[tasks.build]\ncmd = \"echo app\"\n[workspace]\ndepends_on = [\"lib\"]\n",
        );
        write_file(
            &dir.path().join("packages/lib").join(CONFIG_FILENAME),
            "[tasks.build]\ncmd = \"echo lib\"\n",
        );

        let root_config = loader::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        let members = discover(&root_config).unwrap();
        let map = depends_on_map(&members);
        assert_eq!(map.get("app").unwrap(), &vec!["lib".to_string()]);
        assert_eq!(map.get("lib").unwrap(), &Vec::<String>::new());
    }
}
