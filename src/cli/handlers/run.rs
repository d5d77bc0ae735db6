//! `run` handler: resolves targets (alias + matrix expansion), builds the
//! graph, and drives the scheduler to completion.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::handlers::commons;
use crate::cli::{Cli, RunArgs};
use crate::context::CancellationToken;
use crate::core::formatter;
use crate::core::graph;
use crate::core::scheduler::{self, RunOptions};

pub async fn handle(cli: &Cli, args: &RunArgs, cancellation: CancellationToken) -> Result<()> {
    if args.tasks.is_empty() {
        bail!("run requires at least one task name");
    }

    let config = commons::load_config(cli)?;
    let project_root = config.root.clone();
    let ctx = commons::build_context(cli, project_root.clone(), cancellation)?;
    colored::control::set_override(!(ctx.no_color || std::env::var("NO_COLOR").is_ok()));

    let profile_env = commons::resolve_profile_env(&config, cli.profile.as_deref())?;

    let aliases = commons::merged_aliases(&config);
    let targets = graph::expand_aliases(&aliases, &args.tasks)?;
    let all_tasks = graph::resolve_all_tasks(&config)?;
    let built = graph::build(&all_tasks, &targets)?;

    if let Some(base) = &args.affected {
        warn_if_target_unaffected(&config, base, args.include_dependents, args.exclude_self)?;
    }

    let sink: Arc<dyn formatter::Sink> = Arc::from(formatter::build_sink(ctx.format, ctx.quiet));
    let tool_versions = config.tools.clone();

    let options = RunOptions {
        jobs: ctx.jobs,
        dry_run: ctx.dry_run,
        process_env: commons::process_env(),
        profile_env,
        profile_name: cli.profile.clone(),
        tool_versions,
        revision: commons::current_revision(&config.root),
        project_root,
    };

    let cache = Arc::new(crate::core::cache::CacheStore::new(
        ctx.state_dir.join(crate::constants::CACHE_DIR),
    ));
    let history = Arc::new(crate::core::history::HistoryLog::new(
        ctx.state_dir.join(crate::constants::HISTORY_FILENAME),
    ));

    let report = scheduler::run(&built, options, cache, history, sink, ctx.cancellation.clone()).await;

    if !report.success() {
        bail!("one or more tasks failed");
    }
    Ok(())
}

/// `run --affected` on a non-workspace config (or one where the requested
/// targets plainly aren't gated by it) can't change *what* runs — `run`
/// always executes exactly the tasks named on the command line — so this
/// only surfaces the affected-set computation as an informational check,
/// matching the demoted-to-warning policy of §7 for `NoRepo`.
fn warn_if_target_unaffected(
    config: &crate::config::Config,
    base: &str,
    include_dependents: bool,
    exclude_self: bool,
) -> Result<()> {
    let Some(_workspace) = &config.workspace else {
        log::warn!("--affected given but no [workspace] is configured; running all named tasks");
        return Ok(());
    };
    let members = crate::core::workspace::discover(config)?;
    let affected_members = crate::core::workspace::as_affected_members(&config.root, &members);
    let depends_on = crate::core::workspace::depends_on_map(&members);
    match crate::core::affected::affected_set(
        &config.root,
        base,
        &affected_members,
        &depends_on,
        include_dependents,
        exclude_self,
    ) {
        Ok(affected) => {
            log::info!("affected members since '{base}': {affected:?}");
        }
        Err(crate::error::ZrError::NoRepo) => {
            log::warn!("no source-control repository found; --affected ignored");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
