//! Component F: History Log. Append-only, line-delimited JSON, one record
//! per task attempt. Readers tolerate a truncated trailing record (and, a
//! little more generously, any individual garbled line) rather than
//! failing the whole read.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryStatus {
    Succeeded,
    Failed,
    Skipped,
    CacheHit,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub task_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub status: HistoryStatus,
    pub cache_hit: bool,
    pub attempt: u32,
    pub profile: Option<String>,
    pub revision: Option<String>,
}

#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Appends one record. Opened in append mode each call so concurrent
    /// writers (multiple `zr` invocations) only ever add whole lines; a
    /// single `write_all` of one JSON line plus newline stays well under
    /// the platform's atomic-write size limit for the normal case.
    pub fn append(&self, record: &HistoryRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Reads every well-formed record. An absent file reads as empty (not
    /// an error); a line that fails to parse — truncated or otherwise
    /// garbled — is skipped rather than aborting the read.
    pub fn read_all(&self) -> std::io::Result<Vec<HistoryRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn tail(&self, n: usize) -> std::io::Result<Vec<HistoryRecord>> {
        let mut all = self.read_all()?;
        if all.len() > n {
            all.drain(0..all.len() - n);
        }
        Ok(all)
    }

    pub fn since(&self, instant: DateTime<Utc>) -> std::io::Result<Vec<HistoryRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.start >= instant)
            .collect())
    }

    pub fn filter(
        &self,
        task_name: Option<&str>,
        status: Option<HistoryStatus>,
        profile: Option<&str>,
    ) -> std::io::Result<Vec<HistoryRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| task_name.is_none_or(|n| r.task_name == n))
            .filter(|r| status.is_none_or(|s| r.status == s))
            .filter(|r| profile.is_none_or(|p| r.profile.as_deref() == Some(p)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(name: &str, status: HistoryStatus) -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            task_name: name.to_string(),
            start: now,
            end: now,
            exit_code: Some(0),
            status,
            cache_hit: matches!(status, HistoryStatus::CacheHit),
            attempt: 1,
            profile: None,
            revision: None,
        }
    }

    #[test]
    fn empty_log_reads_as_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn append_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.jsonl"));
        log.append(&record("a", HistoryStatus::Succeeded)).unwrap();
        log.append(&record("b", HistoryStatus::Failed)).unwrap();
        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].task_name, "a");
        assert_eq!(all[1].task_name, "b");
    }

    #[test]
    fn tolerates_truncated_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let log = HistoryLog::new(path.clone());
        log.append(&record("a", HistoryStatus::Succeeded)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"task_name\": \"truncated").unwrap();

        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].task_name, "a");
    }

    #[test]
    fn filter_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.jsonl"));
        log.append(&record("a", HistoryStatus::Succeeded)).unwrap();
        log.append(&record("b", HistoryStatus::Failed)).unwrap();
        let failed = log.filter(None, Some(HistoryStatus::Failed), None).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].task_name, "b");
    }

    #[test]
    fn since_filters_by_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.jsonl"));
        let mut old = record("old", HistoryStatus::Succeeded);
        old.start = Utc::now() - Duration::hours(2);
        old.end = old.start;
        log.append(&old).unwrap();
        log.append(&record("new", HistoryStatus::Succeeded)).unwrap();

        let cutoff = Utc::now() - Duration::hours(1);
        let recent = log.since(cutoff).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].task_name, "new");
    }
}
