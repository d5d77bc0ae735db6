//! Component H (output half): the formatter contract of §4.6.5. The
//! scheduler emits structured lifecycle events; a `Sink` renders them as
//! `text` (live-interleaved, colored) or `json` (stable-keyed,
//! line-delimited) without the scheduler itself knowing which.

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;
use serde::Serialize;

use crate::core::history::HistoryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    TaskStarted {
        task: String,
        attempt: u32,
    },
    Line {
        task: String,
        stream: &'static str,
        text: String,
    },
    TaskEnded {
        task: String,
        status: HistoryStatus,
        duration_ms: u64,
        exit_code: Option<i32>,
        cache_hit: bool,
    },
}

/// Receives lifecycle events from the scheduler and renders them. `--quiet`
/// is implemented by a sink that drops `Line` events; this keeps the
/// backpressure rule simple (the scheduler never blocks on a sink, since
/// sinks only ever append to stdout/stderr, which the OS itself buffers).
pub trait Sink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// `text` formatter: live-interleaved lines prefixed with the task name,
/// colored status summaries. Respects `--no-color`/`NO_COLOR` via the
/// global `colored::control` override the CLI boundary sets at startup.
pub struct TextSink {
    pub quiet: bool,
}

impl Sink for TextSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::TaskStarted { task, attempt } => {
                if *attempt > 1 {
                    println!("{} {} (attempt {attempt})", "▶".blue(), task.bold());
                } else if !self.quiet {
                    println!("{} {}", "▶".blue(), task.bold());
                }
            }
            Event::Line { task, stream, text } => {
                if self.quiet {
                    return;
                }
                match *stream {
                    "stderr" => eprintln!("{} {text}", format!("[{task}]").dimmed()),
                    _ => println!("{} {text}", format!("[{task}]").dimmed()),
                }
            }
            Event::TaskEnded {
                task,
                status,
                duration_ms,
                exit_code,
                cache_hit,
            } => {
                let label = match status {
                    HistoryStatus::Succeeded if *cache_hit => "cache-hit".cyan(),
                    HistoryStatus::Succeeded => "ok".green(),
                    HistoryStatus::Failed => "failed".red(),
                    HistoryStatus::Skipped => "skipped".yellow(),
                    HistoryStatus::CacheHit => "cache-hit".cyan(),
                    HistoryStatus::Timeout => "timeout".red(),
                    HistoryStatus::Cancelled => "cancelled".red(),
                };
                let exit = exit_code.map_or_else(|| "-".to_string(), |c| c.to_string());
                println!(
                    "{} {task} {label} ({duration_ms}ms, exit {exit})",
                    "■".dimmed()
                );
            }
        }
    }
}

/// `json` formatter: one stable-keyed JSON object per event, line
/// delimited, always to stdout — `--format json` suppresses raw
/// interleaved child output in favor of framed `line` events so a consumer
/// piping to `jq` never sees unframed bytes (decision recorded in
/// DESIGN.md).
pub struct JsonSink {
    out: Mutex<std::io::Stdout>,
}

impl Default for JsonSink {
    fn default() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl Sink for JsonSink {
    fn emit(&self, event: &Event) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        let mut out = self.out.lock().expect("stdout sink mutex poisoned");
        let _ = writeln!(out, "{line}");
    }
}

pub fn build_sink(format: Format, quiet: bool) -> Box<dyn Sink> {
    match format {
        Format::Text => Box::new(TextSink { quiet }),
        Format::Json => Box::new(JsonSink::default()),
    }
}
