//! Per-user alias store: a small TOML file at the user's config directory,
//! independent of any project's `zr.toml`. Grounded in the same
//! discover-a-path-then-serde-parse shape as the project config loader,
//! scaled down to a single flat table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AliasTarget;
use crate::constants::{USER_ALIASES_FILENAME, USER_CONFIG_SUBDIR};
use crate::error::ZrError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AliasFile {
    #[serde(default)]
    alias: BTreeMap<String, AliasTarget>,
}

/// The user's per-machine alias file path (`~/.config/zr/aliases.toml` on
/// Linux, the platform equivalent elsewhere). `None` if the platform has no
/// resolvable config directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_SUBDIR).join(USER_ALIASES_FILENAME))
}

pub fn load(path: &Path) -> Result<BTreeMap<String, AliasTarget>, ZrError> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path)?;
    let parsed: AliasFile = toml::from_str(&text).map_err(|source| ZrError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed.alias)
}

pub fn save(path: &Path, aliases: &BTreeMap<String, AliasTarget>) -> Result<(), ZrError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = AliasFile {
        alias: aliases.clone(),
    };
    let text = toml::to_string_pretty(&file)
        .map_err(|e| ZrError::Io(std::io::Error::other(e.to_string())))?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.toml");
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn round_trips_single_and_sequence_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.toml");
        let mut aliases = BTreeMap::new();
        aliases.insert("b".to_string(), AliasTarget::Single("build".to_string()));
        aliases.insert(
            "ci".to_string(),
            AliasTarget::Sequence(vec!["lint".to_string(), "test".to_string()]),
        );
        save(&path, &aliases).unwrap();

        let back = load(&path).unwrap();
        assert_eq!(back["b"].targets(), vec!["build".to_string()]);
        assert_eq!(
            back["ci"].targets(),
            vec!["lint".to_string(), "test".to_string()]
        );
    }

    #[test]
    fn add_then_remove_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.toml");
        let mut aliases = load(&path).unwrap();
        aliases.insert("x".to_string(), AliasTarget::Single("y".to_string()));
        save(&path, &aliases).unwrap();

        let mut reloaded = load(&path).unwrap();
        reloaded.remove("x");
        save(&path, &reloaded).unwrap();

        assert!(load(&path).unwrap().is_empty());
    }
}
