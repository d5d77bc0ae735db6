//! Typed model produced by the config loader.
//!
//! Mirrors the data model: `tasks.<name>` tables become [`TaskDef`]s, merged
//! against their `template` (if any) into the fully-resolved [`Task`] the
//! rest of the crate consumes. Deliberately flat and `serde`-driven, the way
//! the original project's own TOML-facing models are flat `serde` structs
//! with a handful of `#[serde(untagged)]` escape hatches for flexible syntax.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `cache = true` or `cache = { inputs = [...], outputs = [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheSpec {
    Enabled(bool),
    Detailed {
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
    },
}

impl CacheSpec {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(b) => *b,
            Self::Detailed { .. } => true,
        }
    }

    pub fn inputs(&self) -> &[String] {
        match self {
            Self::Enabled(_) => &[],
            Self::Detailed { inputs, .. } => inputs,
        }
    }

    pub fn outputs(&self) -> &[String] {
        match self {
            Self::Enabled(_) => &[],
            Self::Detailed { outputs, .. } => outputs,
        }
    }
}

/// `[tasks.<name>]` as written in TOML, before template merge or matrix
/// expansion. Every field is optional so a task can inherit from a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDef {
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub deps_serial: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub timeout: Option<String>,
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub allow_failure: bool,
    pub condition: Option<String>,
    pub cache: Option<CacheSpec>,
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub matrix: BTreeMap<String, Vec<String>>,
    pub template: Option<String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

impl TaskDef {
    /// Overlay `self` over `template`: any field `self` left unset is taken
    /// from `template`. Vec/map fields are only inherited when `self`'s is
    /// empty, so a task can still fully override a template's deps.
    pub fn merged_with_template(&self, template: &TaskDef) -> TaskDef {
        TaskDef {
            cmd: self.cmd.clone().or_else(|| template.cmd.clone()),
            cwd: self.cwd.clone().or_else(|| template.cwd.clone()),
            description: self
                .description
                .clone()
                .or_else(|| template.description.clone()),
            deps: if self.deps.is_empty() {
                template.deps.clone()
            } else {
                self.deps.clone()
            },
            deps_serial: if self.deps_serial.is_empty() {
                template.deps_serial.clone()
            } else {
                self.deps_serial.clone()
            },
            env: {
                let mut merged = template.env.clone();
                merged.extend(self.env.clone());
                merged
            },
            timeout: self.timeout.clone().or_else(|| template.timeout.clone()),
            retry: if self.retry != 0 { self.retry } else { template.retry },
            allow_failure: self.allow_failure || template.allow_failure,
            condition: self.condition.clone().or_else(|| template.condition.clone()),
            cache: self.cache.clone().or_else(|| template.cache.clone()),
            max_concurrent: self.max_concurrent.or(template.max_concurrent),
            tags: if self.tags.is_empty() {
                template.tags.clone()
            } else {
                self.tags.clone()
            },
            matrix: if self.matrix.is_empty() {
                template.matrix.clone()
            } else {
                self.matrix.clone()
            },
            template: None,
            limits: {
                let mut merged = template.limits.clone();
                merged.extend(self.limits.clone());
                merged
            },
        }
    }
}

/// `[alias]`/`[aliases]` entries: a single command-line tail or a sequence
/// of them (list-valued aliases fan out into multiple targets).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasTarget {
    Single(String),
    Sequence(Vec<String>),
}

impl AliasTarget {
    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::Sequence(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    /// Root-only: literal or glob member directory patterns.
    #[serde(default)]
    pub members: Vec<String>,
    /// Member-only: names of sibling workspace members this member depends
    /// on, closed over transitively by `--include-dependents` (§4.4).
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Root of a parsed `zr.toml`. Unknown top-level keys are tolerated by the
/// loader: `config::loader::parse_tolerant` diffs the raw document's keys
/// against this struct's and logs a `log::warn!` per surplus key rather than
/// rejecting the load or modeling them here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDef>,
    #[serde(default)]
    pub alias: BTreeMap<String, AliasTarget>,
    #[serde(default)]
    pub aliases: BTreeMap<String, AliasTarget>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    pub workspace: Option<Workspace>,
    #[serde(default)]
    pub templates: BTreeMap<String, TaskDef>,
    #[serde(default)]
    pub tools: BTreeMap<String, String>,

    #[serde(skip)]
    pub root: std::path::PathBuf,
}

impl Config {
    /// All configured aliases, `[alias]` and `[aliases]` merged (`[aliases]`
    /// wins on key collision, since it's the more explicit plural form).
    pub fn all_aliases(&self) -> BTreeMap<String, AliasTarget> {
        let mut merged = self.alias.clone();
        merged.extend(self.aliases.clone());
        merged
    }
}

/// Fully resolved task: template-merged, matrix-expanded, concrete. This is
/// the only shape the graph builder and scheduler ever see.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub cmd: String,
    pub cwd: Option<String>,
    pub description: Option<String>,
    pub deps: Vec<String>,
    pub deps_serial: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
    pub retry: u32,
    pub allow_failure: bool,
    pub condition: Option<String>,
    pub cache: Option<CacheSpec>,
    pub max_concurrent: Option<usize>,
    pub tags: Vec<String>,
    /// Set for a task produced by matrix expansion: the base task's name and
    /// the dimension assignment that produced this variant.
    pub variant_of: Option<(String, BTreeMap<String, String>)>,
}
