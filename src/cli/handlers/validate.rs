//! `validate` handler: typechecks the configuration (load + graph-build
//! every task) without running anything.

use anyhow::Result;

use crate::cli::handlers::commons;
use crate::cli::{Cli, ValidateArgs};
use crate::core::graph;

pub fn handle(cli: &Cli, _args: &ValidateArgs) -> Result<()> {
    let config = commons::load_config(cli)?;
    let all_tasks = graph::resolve_all_tasks(&config)?;
    let roots: Vec<String> = all_tasks.keys().cloned().collect();
    graph::build(&all_tasks, &roots)?;

    for def in config.templates.values().chain(config.tasks.values()) {
        if let Some(condition) = &def.condition {
            crate::core::condition::parse(condition)?;
        }
    }

    println!("configuration is valid ({} task(s))", all_tasks.len());
    Ok(())
}
