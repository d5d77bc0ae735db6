//! `workspace` handler: `list`, `run <task>` (fan-out across members), and
//! `sync` (an alias for running each member's own `sync` task).

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::handlers::commons;
use crate::cli::{Cli, WorkspaceAction, WorkspaceArgs};
use crate::context::CancellationToken;
use crate::core::formatter;
use crate::core::scheduler::{self, RunOptions};
use crate::core::workspace::{self, Member};

pub async fn handle(
    cli: &Cli,
    args: &WorkspaceArgs,
    cancellation: CancellationToken,
) -> Result<()> {
    match &args.action {
        WorkspaceAction::List => list(cli),
        WorkspaceAction::Run {
            task,
            affected,
            include_dependents,
            exclude_self,
            serial,
        } => {
            run_across_members(
                cli,
                task,
                affected.as_deref(),
                *include_dependents,
                *exclude_self,
                *serial,
                cancellation,
            )
            .await
        }
        WorkspaceAction::Sync { affected } => {
            run_across_members(cli, "sync", affected.as_deref(), false, false, false, cancellation)
                .await
        }
    }
}

fn list(cli: &Cli) -> Result<()> {
    let config = commons::load_config(cli)?;
    let members = workspace::discover(&config)?;
    if members.is_empty() {
        println!("(no workspace members configured)");
        return Ok(());
    }
    for member in &members {
        let has_config = if member.config.is_some() { "" } else { " (no zr.toml)" };
        println!("{}{has_config}", member.name);
    }
    Ok(())
}

fn select_members(
    config: &crate::config::Config,
    members: &[Member],
    affected: Option<&str>,
    include_dependents: bool,
    exclude_self: bool,
) -> Result<Vec<Member>> {
    let Some(base) = affected else {
        return Ok(members.to_vec());
    };

    let affected_members = workspace::as_affected_members(&config.root, members);
    let depends_on = workspace::depends_on_map(members);
    let selected: BTreeSet<String> = match crate::core::affected::affected_set(
        &config.root,
        base,
        &affected_members,
        &depends_on,
        include_dependents,
        exclude_self,
    ) {
        Ok(set) => set,
        Err(crate::error::ZrError::NoRepo) => {
            log::warn!("no source-control repository found; running every member");
            return Ok(members.to_vec());
        }
        Err(err) => return Err(err.into()),
    };

    Ok(members
        .iter()
        .filter(|m| selected.contains(&m.name))
        .cloned()
        .collect())
}

async fn run_across_members(
    cli: &Cli,
    task_name: &str,
    affected: Option<&str>,
    include_dependents: bool,
    exclude_self: bool,
    serial: bool,
    cancellation: CancellationToken,
) -> Result<()> {
    let config = commons::load_config(cli)?;
    colored::control::set_override(!(cli.no_color || std::env::var("NO_COLOR").is_ok()));

    let members = workspace::discover(&config)?;
    if members.is_empty() {
        bail!("no [workspace] members configured");
    }
    let selected = select_members(&config, &members, affected, include_dependents, exclude_self)?;

    let profile_env = commons::resolve_profile_env(&config, cli.profile.as_deref())?;
    let ctx = commons::build_context(cli, config.root.clone(), cancellation)?;

    let mut overall_ok = true;
    if serial {
        for member in &selected {
            if !run_member(&ctx, cli, &member, task_name, &profile_env).await? {
                overall_ok = false;
            }
        }
    } else {
        let futures = selected
            .iter()
            .map(|member| run_member(&ctx, cli, member, task_name, &profile_env));
        let results = futures::future::join_all(futures).await;
        for result in results {
            if !result? {
                overall_ok = false;
            }
        }
    }

    if !overall_ok {
        bail!("one or more workspace members failed");
    }
    Ok(())
}

/// Runs `task_name` inside a single member's own config (if it has one and
/// declares the task); members without it are silently skipped, matching
/// the namespaced-and-independent model of §3's Workspace entry.
async fn run_member(
    ctx: &crate::context::Context,
    cli: &Cli,
    member: &Member,
    task_name: &str,
    profile_env: &std::collections::BTreeMap<String, String>,
) -> Result<bool> {
    let Some(member_config) = &member.config else {
        return Ok(true);
    };
    let all_tasks = crate::core::graph::resolve_all_tasks(member_config)?;
    if !all_tasks.contains_key(task_name) {
        return Ok(true);
    }

    let built = crate::core::graph::build(&all_tasks, &[task_name.to_string()])?;
    let sink: Arc<dyn formatter::Sink> = Arc::from(formatter::build_sink(ctx.format, ctx.quiet));
    let cache = Arc::new(crate::core::cache::CacheStore::new(
        member.path.join(crate::constants::STATE_DIR).join(crate::constants::CACHE_DIR),
    ));
    let history = Arc::new(crate::core::history::HistoryLog::new(
        member
            .path
            .join(crate::constants::STATE_DIR)
            .join(crate::constants::HISTORY_FILENAME),
    ));

    let options = RunOptions {
        jobs: ctx.jobs,
        dry_run: ctx.dry_run,
        process_env: commons::process_env(),
        profile_env: profile_env.clone(),
        profile_name: cli.profile.clone(),
        tool_versions: member_config.tools.clone(),
        revision: commons::current_revision(&member.path),
        project_root: member.path.clone(),
    };

    let report = scheduler::run(&built, options, cache, history, sink, ctx.cancellation.clone()).await;
    Ok(report.success())
}
