//! `graph` handler: renders the dependency graph as `ascii | dot | html | json`.

use anyhow::{bail, Result};

use crate::cli::handlers::commons;
use crate::cli::{Cli, GraphArgs};
use crate::config::Config;
use crate::core::graph::{self, EdgeKind, Graph};

pub fn handle(cli: &Cli, args: &GraphArgs) -> Result<()> {
    let config = commons::load_config(cli)?;
    let all_tasks = graph::resolve_all_tasks(&config)?;

    let aliases = commons::merged_aliases(&config);
    let mut roots: Vec<String> = if args.tasks.is_empty() {
        all_tasks.keys().cloned().collect()
    } else {
        graph::expand_aliases(&aliases, &args.tasks)?
    };

    if let Some(base) = &args.affected {
        roots = filter_roots_by_affected(&config, roots, base)?;
    }

    let built = graph::build(&all_tasks, &roots)?;

    match cli.format.as_str() {
        "json" => render_json(&built, args.depth)?,
        "dot" => render_dot(&built, args.depth),
        "html" => render_html(&built, args.depth),
        "ascii" | "text" => render_ascii(&built, args.depth),
        other => bail!(crate::error::ZrError::UnsupportedFormat(other.to_string())),
    }
    Ok(())
}

/// Restricts `roots` to the tasks named after a currently-affected
/// workspace member, the same member set `workspace run --affected` would
/// select. No `[workspace]` configured, or `NoRepo` (no source-control
/// checkout), both demote to a warning and render the unfiltered roots
/// instead, per §7's "fallback-to-all for graph" policy.
fn filter_roots_by_affected(config: &Config, roots: Vec<String>, base: &str) -> Result<Vec<String>> {
    let Some(_workspace) = &config.workspace else {
        log::warn!("--affected given but no [workspace] is configured; rendering all tasks");
        return Ok(roots);
    };
    let members = crate::core::workspace::discover(config)?;
    let affected_members = crate::core::workspace::as_affected_members(&config.root, &members);
    let depends_on = crate::core::workspace::depends_on_map(&members);
    match crate::core::affected::affected_set(
        &config.root,
        base,
        &affected_members,
        &depends_on,
        false,
        false,
    ) {
        Ok(affected) => Ok(roots.into_iter().filter(|r| affected.contains(r)).collect()),
        Err(crate::error::ZrError::NoRepo) => {
            log::warn!("no source-control repository found; --affected ignored");
            Ok(roots)
        }
        Err(err) => Err(err.into()),
    }
}

fn within_depth(level: usize, depth: Option<usize>) -> bool {
    depth.is_none_or(|d| level <= d)
}

fn render_ascii(graph: &Graph, depth: Option<usize>) {
    let mut by_level: std::collections::BTreeMap<usize, Vec<&str>> = std::collections::BTreeMap::new();
    for node in &graph.nodes {
        if within_depth(node.level, depth) {
            by_level.entry(node.level).or_default().push(&node.task.name);
        }
    }
    for (level, mut names) in by_level {
        names.sort_unstable();
        println!("level {level}: {}", names.join(", "));
    }
}

fn render_dot(graph: &Graph, depth: Option<usize>) {
    println!("digraph zr {{");
    for (from, to, kind) in graph.edges() {
        let from_node = graph.node(from);
        let to_node = graph.node(to);
        if !within_depth(from_node.level, depth) || !within_depth(to_node.level, depth) {
            continue;
        }
        let style = match kind {
            EdgeKind::Parallel => "",
            EdgeKind::Serial => " [style=bold]",
        };
        println!(
            "  \"{}\" -> \"{}\"{style};",
            from_node.task.name, to_node.task.name
        );
    }
    println!("}}");
}

fn render_html(graph: &Graph, depth: Option<usize>) {
    println!("<!doctype html><html><body><pre>");
    render_ascii(graph, depth);
    println!("</pre></body></html>");
}

fn render_json(graph: &Graph, depth: Option<usize>) -> Result<()> {
    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| within_depth(n.level, depth))
        .map(|n| {
            serde_json::json!({
                "name": n.task.name,
                "level": n.level,
                "deps": n.deps.iter().map(|&i| graph.node(i).task.name.clone()).collect::<Vec<_>>(),
                "deps_serial": n.deps_serial.iter().map(|&i| graph.node(i).task.name.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}
