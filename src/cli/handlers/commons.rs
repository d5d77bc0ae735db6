//! Shared plumbing every handler needs: config discovery, profile
//! resolution, `--jobs` parsing, and format validation. Centralized here the
//! way the teacher keeps cross-handler helpers in one `commons` module
//! instead of duplicating them per handler.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context as _, Result};

use crate::cli::{Cli, Format};
use crate::config::{AliasTarget, Config};
use crate::context::{CancellationToken, Context};
use crate::error::ZrError;

/// Resolves `--config`/upward discovery into a loaded, validated [`Config`].
pub fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            crate::config::loader::discover(&cwd)
                .ok_or_else(|| ZrError::ConfigNotFound(cwd.clone()))?
        }
    };
    crate::config::loader::load(&path).map_err(Into::into)
}

/// `--jobs`: `0` (or unset) defaults to the logical CPU count, `>=1` is used
/// exactly, anything else (negative, non-numeric) is `InvalidJobs`.
pub fn parse_jobs(jobs: Option<&str>) -> Result<usize> {
    let default = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    let Some(raw) = jobs else {
        return Ok(default);
    };
    let n: i64 = raw
        .parse()
        .map_err(|_| ZrError::InvalidJobs(raw.to_string()))?;
    if n < 0 {
        return Err(ZrError::InvalidJobs(raw.to_string()).into());
    }
    if n == 0 {
        return Ok(default);
    }
    Ok(usize::try_from(n).unwrap_or(default))
}

/// Selects `config.profiles[name]`'s env overlay; an unknown profile name is
/// fatal, matching §3's "unknown profile is an error".
pub fn resolve_profile_env(
    config: &Config,
    profile: Option<&str>,
) -> Result<BTreeMap<String, String>> {
    let Some(name) = profile else {
        return Ok(BTreeMap::new());
    };
    config
        .profiles
        .get(name)
        .map(|p| p.env.clone())
        .ok_or_else(|| anyhow::anyhow!("unknown profile '{name}'"))
}

pub fn parse_format(raw: &str) -> Result<Format> {
    Format::from_str(raw).map_err(|bad| ZrError::UnsupportedFormat(bad).into())
}

/// Project-config aliases (`[alias]`/`[aliases]`) overlaid with the
/// per-user alias store; the user store wins on name collision, the same
/// precedence `alias show`/`alias list` use. Every alias-consuming verb
/// (`run`, `graph`) resolves through this so an alias added via
/// `zr alias add` actually takes effect, not just when shown back.
pub fn merged_aliases(config: &Config) -> BTreeMap<String, AliasTarget> {
    let mut merged = config.all_aliases();
    if let Some(path) = crate::core::alias_store::default_path() {
        match crate::core::alias_store::load(&path) {
            Ok(user) => merged.extend(user),
            Err(err) => log::warn!("failed to load user alias store at {}: {err}", path.display()),
        }
    }
    merged
}

/// Builds the per-invocation [`Context`]: state directory, worker pool size,
/// formatter choice, and the cancellation flag `main` wired to ctrl-c.
pub fn build_context(
    cli: &Cli,
    project_root: PathBuf,
    cancellation: CancellationToken,
) -> Result<Context> {
    let state_dir = project_root.join(crate::constants::STATE_DIR);
    let jobs = parse_jobs(cli.jobs.as_deref())?;
    let format = parse_format(&cli.format)?;
    Ok(Context::new(
        project_root,
        state_dir,
        jobs,
        format,
        cli.dry_run,
        cli.no_color,
    )
    .with_quiet(cli.quiet)
    .with_cancellation(cancellation))
}

/// Process environment snapshot, the first (lowest-precedence) layer of the
/// env-merge chain described in §6.
pub fn process_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Best-effort current revision for history records; `None` outside a git
/// checkout (or if `git` itself is unavailable) rather than an error, since
/// the revision is purely informational.
pub fn current_revision(root: &std::path::Path) -> Option<String> {
    let output = std::process::Command::new("git")
        .arg("rev-parse")
        .arg("--short")
        .arg("HEAD")
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if rev.is_empty() {
        None
    } else {
        Some(rev)
    }
}
