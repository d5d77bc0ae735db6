//! `alias` handler: `add|set`, `remove|rm|delete`, `show|get`, `list|ls`.
//! Mutates only the per-user alias store; aliases declared in `zr.toml`
//! itself are edited by hand like any other config section.

use anyhow::{bail, Result};

use crate::cli::handlers::commons;
use crate::cli::{AliasAction, AliasArgs, Cli};
use crate::config::AliasTarget;
use crate::core::alias_store;

fn store_path() -> Result<std::path::PathBuf> {
    alias_store::default_path().ok_or_else(|| anyhow::anyhow!("no resolvable user config directory on this platform"))
}

pub fn handle(cli: &Cli, args: &AliasArgs) -> Result<()> {
    let path = store_path()?;
    match &args.action {
        AliasAction::Add { name, targets } => {
            if targets.is_empty() {
                bail!("alias add requires at least one target");
            }
            let mut aliases = alias_store::load(&path)?;
            let target = if targets.len() == 1 {
                AliasTarget::Single(targets[0].clone())
            } else {
                AliasTarget::Sequence(targets.clone())
            };
            aliases.insert(name.clone(), target);
            alias_store::save(&path, &aliases)?;
            println!("alias '{name}' saved");
        }
        AliasAction::Remove { name } => {
            let mut aliases = alias_store::load(&path)?;
            if aliases.remove(name).is_none() {
                bail!("no such alias '{name}'");
            }
            alias_store::save(&path, &aliases)?;
            println!("alias '{name}' removed");
        }
        AliasAction::Show { name } => {
            let merged = merged_aliases(cli)?;
            let Some(target) = merged.get(name) else {
                bail!("no such alias '{name}'");
            };
            println!("{name} -> {}", target.targets().join(" "));
        }
        AliasAction::List => {
            let merged = merged_aliases(cli)?;
            if cli.format == "json" {
                let entries: std::collections::BTreeMap<String, Vec<String>> = merged
                    .iter()
                    .map(|(name, target)| (name.clone(), target.targets()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            for (name, target) in &merged {
                println!("{name} -> {}", target.targets().join(" "));
            }
        }
    }
    Ok(())
}

/// Project-config aliases overlaid with the user's persistent store, via the
/// same merge `run`/`graph` resolve their targets against.
fn merged_aliases(cli: &Cli) -> Result<std::collections::BTreeMap<String, AliasTarget>> {
    let config = commons::load_config(cli)?;
    Ok(commons::merged_aliases(&config))
}
