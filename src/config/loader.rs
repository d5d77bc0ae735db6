//! Config discovery, parsing, template merge and validation (Component A).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constants::CONFIG_FILENAME;
use crate::error::{InvalidConfigKind, ZrError};

use super::duration::parse_duration_ms;
use super::model::{Config, TaskDef};

/// Searches upward from `start` for `zr.toml`, the same ancestor-walk the
/// original project used for its own project-root discovery.
pub fn discover(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

/// Loads and validates the config at `path`. `path` is either explicit
/// (`--config`) or the result of [`discover`].
pub fn load(path: &Path) -> Result<Config, ZrError> {
    let text = std::fs::read_to_string(path)?;
    let mut config = parse_tolerant(&text, path)?;
    config.root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    validate(&config)?;
    Ok(config)
}

/// Top-level keys [`Config`] actually models; anything else in the document
/// is a surplus key §4.1 asks us to warn about rather than reject.
const RECOGNIZED_TOP_LEVEL_KEYS: &[&str] =
    &["tasks", "alias", "aliases", "profiles", "workspace", "templates", "tools"];

/// Parses the document, then re-attempts each `tasks.<name>` table
/// individually so a single malformed task degrades to "missing" rather
/// than aborting the whole load (documented quirk, preserved deliberately).
/// Also diffs the raw table's keys against [`RECOGNIZED_TOP_LEVEL_KEYS`] and
/// logs a warning per unrecognized one, per §4.1's "unknown keys: warn, do
/// not fail."
fn parse_tolerant(text: &str, path: &Path) -> Result<Config, ZrError> {
    let value: toml::Value = toml::from_str(text).map_err(|source| ZrError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    if let toml::Value::Table(top) = &value {
        for key in top.keys() {
            if !RECOGNIZED_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                log::warn!("unknown top-level key '{key}' in {}; ignoring", path.display());
            }
        }
    }

    let mut config: Config = Config::deserialize(value.clone()).unwrap_or_default();

    if let Some(toml::Value::Table(tasks_table)) = value.get("tasks") {
        let mut surviving = BTreeMap::new();
        for (name, raw) in tasks_table {
            match TaskDef::deserialize(raw.clone()) {
                Ok(def) => {
                    surviving.insert(name.clone(), def);
                }
                Err(err) => {
                    log::warn!(
                        "task table '{name}' in {} failed to parse ({err}); treating as absent",
                        path.display()
                    );
                }
            }
        }
        config.tasks = surviving;
    }

    Ok(config)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validates every resolved task definition. Matrix presence suspends the
/// `cmd`-required rule only when every matrix-expanded concrete task will
/// inherit one from a template; plain per-field checks otherwise match §4.1.
fn validate(config: &Config) -> Result<(), ZrError> {
    for (name, def) in &config.tasks {
        if !is_valid_name(name) {
            return Err(InvalidConfigKind::BadName(name.clone()).into());
        }

        let resolved = resolve_template(config, def)?;

        let has_cmd = resolved.cmd.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !has_cmd {
            return Err(InvalidConfigKind::EmptyCmd.into());
        }

        if let Some(timeout) = &resolved.timeout {
            parse_duration_ms(timeout)?;
        }

        for (dim, values) in &resolved.matrix {
            if values.is_empty() {
                return Err(InvalidConfigKind::BadMatrix(dim.clone()).into());
            }
        }
    }
    Ok(())
}

/// Merges a task definition against its template, if any, recursively
/// resolving template-of-template chains (templates do not themselves
/// reference further templates in practice, but the merge is defensive).
pub fn resolve_template(config: &Config, def: &TaskDef) -> Result<TaskDef, ZrError> {
    match &def.template {
        None => Ok(def.clone()),
        Some(template_name) => {
            let template = config.templates.get(template_name).ok_or_else(|| {
                ZrError::InvalidConfig(InvalidConfigKind::UnknownTask(template_name.clone()))
            })?;
            Ok(def.merged_with_template(template))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join(CONFIG_FILENAME)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        dir
    }

    #[test]
    fn discovers_config_from_nested_directory() {
        let dir = write_config("[tasks.hello]\ncmd = \"echo hello\"\n");
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = discover(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILENAME));
    }

    #[test]
    fn loads_simple_task() {
        let dir = write_config("[tasks.hello]\ncmd = \"echo hello\"\n");
        let config = load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.tasks["hello"].cmd.as_deref(), Some("echo hello"));
    }

    #[test]
    fn empty_cmd_is_rejected() {
        let dir = write_config("[tasks.hello]\ncmd = \"\"\n");
        let err = load(&dir.path().join(CONFIG_FILENAME)).unwrap_err();
        assert!(matches!(
            err,
            ZrError::InvalidConfig(InvalidConfigKind::EmptyCmd)
        ));
    }

    #[test]
    fn bad_name_is_rejected() {
        let dir = write_config("[tasks.\"bad name!\"]\ncmd = \"echo hi\"\n");
        let err = load(&dir.path().join(CONFIG_FILENAME)).unwrap_err();
        assert!(matches!(
            err,
            ZrError::InvalidConfig(InvalidConfigKind::BadName(_))
        ));
    }

    #[test]
    fn malformed_task_table_is_dropped_not_fatal() {
        // `deps` given as an integer cannot deserialize into Vec<String>;
        // the documented quirk means this degrades to a missing task.
        let dir = write_config(
            "[tasks.good]\ncmd = \"echo good\"\n\n[tasks.bad]\ncmd = \"echo bad\"\ndeps = 5\n",
        );
        let config = load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(config.tasks.contains_key("good"));
        assert!(!config.tasks.contains_key("bad"));
    }

    #[test]
    fn unknown_top_level_key_is_tolerated() {
        let dir = write_config(
            "[tasks.hello]\ncmd = \"echo hello\"\n\n[bogus]\nwhatever = 1\n",
        );
        let config = load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(config.tasks.contains_key("hello"));
    }

    #[test]
    fn empty_matrix_dimension_is_rejected() {
        let dir = write_config(
            "[tasks.t]\ncmd = \"echo hi\"\n[tasks.t.matrix]\nos = []\n",
        );
        let err = load(&dir.path().join(CONFIG_FILENAME)).unwrap_err();
        assert!(matches!(
            err,
            ZrError::InvalidConfig(InvalidConfigKind::BadMatrix(_))
        ));
    }
}
