//! One handler module per verb of §6, plus `commons` for the plumbing they
//! all share.

pub mod alias;
pub mod commons;
pub mod graph;
pub mod history;
pub mod init;
pub mod list;
pub mod run;
pub mod validate;
pub mod workspace;

use anyhow::Result;

use crate::cli::{Cli, Command};
use crate::context::CancellationToken;

/// Routes a parsed [`Cli`] to its handler. The exit-code discipline of §6 is
/// left to the caller: any `Err` here becomes a non-zero process exit.
/// `cancellation` is the flag `main` flips on ctrl-c; only the two verbs that
/// drive the scheduler (`run`, `workspace run`/`sync`) need it.
pub async fn dispatch(cli: Cli, cancellation: CancellationToken) -> Result<()> {
    match &cli.command {
        Command::Run(args) => run::handle(&cli, args, cancellation).await,
        Command::List(args) => list::handle(&cli, args),
        Command::Graph(args) => graph::handle(&cli, args),
        Command::History(args) => history::handle(&cli, args),
        Command::Alias(args) => alias::handle(&cli, args),
        Command::Workspace(args) => workspace::handle(&cli, args, cancellation).await,
        Command::Validate(args) => validate::handle(&cli, args),
        Command::Init(args) => init::handle(&cli, args),
    }
}
