//! `init` handler: scaffolds a new `zr.toml`, optionally seeded by scanning
//! the project tree (`--detect`) or an existing Makefile/justfile/Taskfile.
//! A peripheral boundary feature (§1 names it an external collaborator), so
//! the seeding heuristics below are deliberately simple line scans rather
//! than a full build-file parser.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::{Cli, InitArgs};
use crate::constants::CONFIG_FILENAME;

/// One seeded task: name plus the command line it should run.
struct Seed {
    name: String,
    cmd: String,
}

pub fn handle(cli: &Cli, args: &InitArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let target = cwd.join(CONFIG_FILENAME);
    if target.exists() {
        bail!("{} already exists", target.display());
    }
    let _ = cli;

    let mut seeds = Vec::new();
    if let Some(path) = &args.from_make {
        seeds.extend(seeds_from_make(Path::new(path))?);
    }
    if let Some(path) = &args.from_just {
        seeds.extend(seeds_from_just(Path::new(path))?);
    }
    if let Some(path) = &args.from_task {
        seeds.extend(seeds_from_taskfile(Path::new(path))?);
    }
    if args.detect {
        seeds.extend(detect_seeds(&cwd)?);
    }

    let toml = render_toml(&seeds);
    std::fs::write(&target, toml)?;
    println!("wrote {} with {} task(s)", target.display(), seeds.len());
    Ok(())
}

fn render_toml(seeds: &[Seed]) -> String {
    if seeds.is_empty() {
        return "# zr.toml — see https://github.com/retypeos/zr for the full schema\n\n[tasks.hello]\ncmd = \"echo hello\"\n".to_string();
    }
    let mut out = String::from("# zr.toml — generated by `zr init`\n\n");
    for seed in seeds {
        out.push_str(&format!(
            "[tasks.{}]\ncmd = {:?}\n\n",
            seed.name, seed.cmd
        ));
    }
    out
}

/// Naive Makefile target scan: a line starting in column 0 with
/// `name:` (no leading tab, not a variable assignment) introduces a target.
fn seeds_from_make(path: &Path) -> Result<Vec<Seed>> {
    let text = std::fs::read_to_string(path)?;
    let mut seeds = Vec::new();
    for line in text.lines() {
        if line.starts_with('\t') || line.starts_with(' ') || line.trim().is_empty() {
            continue;
        }
        if let Some((name, rest)) = line.split_once(':') {
            if name.contains(' ') || name.contains('=') || rest.contains('=') {
                continue;
            }
            seeds.push(Seed {
                name: name.trim().to_string(),
                cmd: format!("make {}", name.trim()),
            });
        }
    }
    Ok(seeds)
}

/// Naive justfile recipe scan: `recipe-name:` (or `recipe-name arg:`) at
/// column 0, mirroring just's own grammar closely enough for a seed list.
fn seeds_from_just(path: &Path) -> Result<Vec<Seed>> {
    let text = std::fs::read_to_string(path)?;
    let mut seeds = Vec::new();
    for line in text.lines() {
        if line.starts_with([' ', '\t']) || line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((head, _)) = line.split_once(':') {
            let name = head.split_whitespace().next().unwrap_or_default();
            if name.is_empty() || name.starts_with('[') {
                continue;
            }
            seeds.push(Seed {
                name: name.to_string(),
                cmd: format!("just {name}"),
            });
        }
    }
    Ok(seeds)
}

/// Naive Taskfile scan: under a top-level `tasks:` key, a two-space-indented
/// `name:` line names a task. No YAML dependency is introduced for this —
/// the indentation convention is uniform enough across real Taskfiles.
fn seeds_from_taskfile(path: &Path) -> Result<Vec<Seed>> {
    let text = std::fs::read_to_string(path)?;
    let mut seeds = Vec::new();
    let mut in_tasks = false;
    for line in text.lines() {
        if line.trim_end() == "tasks:" {
            in_tasks = true;
            continue;
        }
        if !in_tasks {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            break;
        }
        let indent = line.len() - line.trim_start().len();
        if indent == 2 {
            if let Some((name, _)) = line.trim().split_once(':') {
                seeds.push(Seed {
                    name: name.trim().to_string(),
                    cmd: format!("task {}", name.trim()),
                });
            }
        }
    }
    Ok(seeds)
}

/// `--detect`: looks for `Cargo.toml`/`package.json`/`Makefile` in `root`
/// and proposes the conventional tasks each implies.
fn detect_seeds(root: &Path) -> Result<Vec<Seed>> {
    let mut seeds = Vec::new();
    if root.join("Cargo.toml").is_file() {
        seeds.push(Seed { name: "build".to_string(), cmd: "cargo build".to_string() });
        seeds.push(Seed { name: "test".to_string(), cmd: "cargo test".to_string() });
        seeds.push(Seed { name: "lint".to_string(), cmd: "cargo clippy".to_string() });
    }
    if let Ok(text) = std::fs::read_to_string(root.join("package.json")) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(scripts) = value.get("scripts").and_then(|s| s.as_object()) {
                let mut names: BTreeMap<String, String> = BTreeMap::new();
                for (name, cmd) in scripts {
                    if let Some(cmd) = cmd.as_str() {
                        names.insert(name.clone(), cmd.to_string());
                    }
                }
                for (name, _) in names {
                    seeds.push(Seed { name: name.clone(), cmd: format!("npm run {name}") });
                }
            }
        }
    }
    if root.join("Makefile").is_file() {
        seeds.extend(seeds_from_make(&root.join("Makefile"))?);
    }
    Ok(seeds)
}
