//! `history` handler: reads the append-only log and renders a filtered tail.

use anyhow::Result;
use chrono::DateTime;

use crate::cli::handlers::commons;
use crate::cli::{Cli, Format, HistoryArgs};
use crate::core::history::{HistoryLog, HistoryStatus};

fn parse_status(raw: &str) -> Option<HistoryStatus> {
    match raw {
        "succeeded" => Some(HistoryStatus::Succeeded),
        "failed" => Some(HistoryStatus::Failed),
        "skipped" => Some(HistoryStatus::Skipped),
        "cache-hit" => Some(HistoryStatus::CacheHit),
        "timeout" => Some(HistoryStatus::Timeout),
        "cancelled" => Some(HistoryStatus::Cancelled),
        _ => None,
    }
}

pub fn handle(cli: &Cli, args: &HistoryArgs) -> Result<()> {
    let config = commons::load_config(cli)?;
    let format = commons::parse_format(&cli.format)?;
    let state_dir = config.root.join(crate::constants::STATE_DIR);
    let log = HistoryLog::new(state_dir.join(crate::constants::HISTORY_FILENAME));

    let status = args.status.as_deref().and_then(parse_status);
    let mut records = log.filter(args.task.as_deref(), status, cli.profile.as_deref())?;

    if let Some(since) = &args.since {
        let cutoff = DateTime::parse_from_rfc3339(since)?.with_timezone(&chrono::Utc);
        records.retain(|r| r.start >= cutoff);
    }
    if records.len() > args.limit {
        records.drain(0..records.len() - args.limit);
    }

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        let status = format!("{:?}", record.status);
        println!(
            "{}  {}  attempt {}  exit {}  {status}",
            record.start.to_rfc3339(),
            record.task_name,
            record.attempt,
            record
                .exit_code
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
        );
    }
    Ok(())
}
