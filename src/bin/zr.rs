// src/bin/zr.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::*;

use zr::cli::handlers;
use zr::cli::Cli;
use zr::context::CancellationToken;

/// The process entry point: parses arguments, wires ctrl-c into the shared
/// cancellation flag, and races it against the dispatched handler so a
/// second signal doesn't have to wait for the first to be noticed.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    log::debug!("parsed CLI: {cli:?}");

    let cancellation: CancellationToken = Arc::new(AtomicBool::new(false));
    let signal_token = cancellation.clone();

    let exit_code = tokio::select! {
        result = handlers::dispatch(cli, cancellation.clone()) => {
            match result {
                Ok(()) => 0,
                Err(err) => {
                    if cancellation.load(Ordering::SeqCst) {
                        130
                    } else {
                        eprintln!("{}: {err:#}", "error".red().bold());
                        1
                    }
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            signal_token.store(true, Ordering::SeqCst);
            eprintln!("\n{}", "cancellation requested, waiting for tasks to stop...".yellow());
            // Give the in-flight run a chance to observe the flag and shut
            // down cleanly; a second ctrl-c forces an immediate exit.
            tokio::select! {
                _ = tokio::signal::ctrl_c() => 130,
                _ = tokio::time::sleep(std::time::Duration::from_secs(10)) => 130,
            }
        }
    };

    std::process::exit(exit_code);
}

/// `RUST_LOG` wins if set; otherwise the default filter is `warn`, shifted
/// one step by `--verbose`/`--quiet` (last-occurrence-wins between the two
/// is already resolved by clap before this runs, since both are plain bools
/// on the same struct — `--quiet` is treated as authoritative here since it
/// also governs formatter suppression).
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
