//! Component H (command half): the outer command surface of §6. `clap`'s
//! derive API defines the verb table as a `Subcommand` enum, each variant
//! owning its flags via `#[derive(Args)]`, mirroring the teacher's
//! per-handler arg-struct idiom. Global flags are hoisted onto the top-level
//! `Cli` struct so clap enforces last-occurrence-wins on repeated flags
//! itself (§4.8).

use clap::{Args, Parser, Subcommand};

pub mod handlers;

pub use crate::core::formatter::Format;

/// zr: a declarative task runner with caching, dependency scheduling, and
/// affected-set analysis.
#[derive(Parser, Debug)]
#[command(name = "zr", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file. Defaults to searching upward from cwd for `zr.toml`.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Named profile to overlay onto task environments.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Worker pool size. `0` means "default to logical CPU count".
    #[arg(long, global = true)]
    pub jobs: Option<String>,

    /// Output format for the active verb.
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Raise the default log level by one step.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Lower the default log level by one step and suppress task output lines.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Disable ANSI color, regardless of terminal support.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Walk the graph and print the plan without running anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one or more tasks.
    Run(RunArgs),
    /// Enumerate configured tasks.
    #[command(alias = "ls")]
    List(ListArgs),
    /// Render the dependency graph.
    Graph(GraphArgs),
    /// Show past execution history.
    History(HistoryArgs),
    /// Manage aliases.
    Alias(AliasArgs),
    /// Fan out a task across workspace members.
    Workspace(WorkspaceArgs),
    /// Typecheck the configuration without running anything.
    Validate(ValidateArgs),
    /// Scaffold a new `zr.toml`.
    Init(InitArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task name(s) to run; alias expansion and matrix variants apply.
    pub tasks: Vec<String>,

    /// Show a live summary of in-flight tasks (accepted for compatibility; a no-op beyond the formatter's own output).
    #[arg(long)]
    pub monitor: bool,

    /// Restrict the run to workspace members affected since `<ref>`.
    #[arg(long)]
    pub affected: Option<String>,

    /// With `--affected`, also include transitive dependents of affected members.
    #[arg(long)]
    pub include_dependents: bool,

    /// With `--affected`, exclude the directly affected members from the result.
    #[arg(long)]
    pub exclude_self: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list tasks carrying every one of these tags.
    #[arg(long)]
    pub tags: Vec<String>,

    /// Render as a dependency tree instead of a flat list.
    #[arg(long)]
    pub tree: bool,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Root task(s) to render the graph from; defaults to every task.
    pub tasks: Vec<String>,

    /// Limit rendering to this many levels from the roots.
    #[arg(long)]
    pub depth: Option<usize>,

    /// Restrict the graph to workspace members affected since `<ref>`.
    #[arg(long)]
    pub affected: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only show the last N records.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Only show records at or after this RFC 3339 instant.
    #[arg(long)]
    pub since: Option<String>,

    /// Only show records for this task.
    #[arg(long)]
    pub task: Option<String>,

    /// Only show records in this status (`succeeded|failed|skipped|cache-hit|timeout|cancelled`).
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct AliasArgs {
    #[command(subcommand)]
    pub action: AliasAction,
}

#[derive(Subcommand, Debug)]
pub enum AliasAction {
    /// Define a new alias, or overwrite an existing one.
    #[command(alias = "set")]
    Add { name: String, targets: Vec<String> },
    /// Remove an alias.
    #[command(alias = "rm", alias = "delete")]
    Remove { name: String },
    /// Show a single alias's expansion.
    #[command(alias = "get")]
    Show { name: String },
    /// List every known alias.
    #[command(alias = "ls")]
    List,
}

#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub action: WorkspaceAction,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceAction {
    /// List discovered workspace members.
    #[command(alias = "ls")]
    List,
    /// Run a task across every (or every affected) workspace member.
    Run {
        task: String,
        #[arg(long)]
        affected: Option<String>,
        #[arg(long)]
        include_dependents: bool,
        #[arg(long)]
        exclude_self: bool,
        /// Run members one at a time instead of concurrently.
        #[arg(long)]
        serial: bool,
    },
    /// Alias for `workspace run sync` in projects that name their fan-out task `sync`.
    Sync {
        #[arg(long)]
        affected: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct ValidateArgs;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Inspect the project tree and propose tasks from what it finds.
    #[arg(long)]
    pub detect: bool,

    /// Seed the new config from an existing Makefile.
    #[arg(long)]
    pub from_make: Option<String>,

    /// Seed the new config from an existing justfile.
    #[arg(long)]
    pub from_just: Option<String>,

    /// Seed the new config from an existing Taskfile.
    #[arg(long)]
    pub from_task: Option<String>,
}
