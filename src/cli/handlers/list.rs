//! `list` handler: enumerates resolved tasks, optionally filtered by tag and
//! rendered as a dependency tree.

use anyhow::Result;
use colored::Colorize;

use crate::cli::handlers::commons;
use crate::cli::{Cli, Format, ListArgs};
use crate::core::graph;

pub fn handle(cli: &Cli, args: &ListArgs) -> Result<()> {
    let config = commons::load_config(cli)?;
    colored::control::set_override(!(cli.no_color || std::env::var("NO_COLOR").is_ok()));
    let format = commons::parse_format(&cli.format)?;

    let all_tasks = graph::resolve_all_tasks(&config)?;
    let mut names: Vec<&String> = all_tasks
        .keys()
        .filter(|name| {
            args.tags.is_empty()
                || all_tasks[*name]
                    .tags
                    .iter()
                    .any(|t| args.tags.contains(t))
        })
        .collect();
    names.sort();

    if format == Format::Json {
        let entries: Vec<_> = names
            .iter()
            .map(|name| {
                let task = &all_tasks[*name];
                serde_json::json!({
                    "name": task.name,
                    "description": task.description,
                    "deps": task.deps,
                    "deps_serial": task.deps_serial,
                    "tags": task.tags,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if args.tree {
        for name in &names {
            print_tree(&all_tasks, name, 0);
        }
        return Ok(());
    }

    for name in names {
        let task = &all_tasks[name];
        match &task.description {
            Some(desc) => println!("{}  {}", name.bold(), desc.dimmed()),
            None => println!("{}", name.bold()),
        }
    }
    Ok(())
}

fn print_tree(
    all_tasks: &std::collections::BTreeMap<String, crate::config::Task>,
    name: &str,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    println!("{indent}{name}");
    let Some(task) = all_tasks.get(name) else {
        return;
    };
    for dep in task.deps.iter().chain(task.deps_serial.iter()) {
        print_tree(all_tasks, dep, depth + 1);
    }
}
