//! Component G: Scheduler / Runner — the heart of the engine. Walks the
//! graph built by Component C, dispatches ready nodes onto a bounded
//! worker pool, and honors every per-task semantic: condition, upstream
//! failure propagation, cache probe/write, timeout, retry, allow-failure,
//! matrix `max_concurrent` groups, cancellation and dry-run.
//!
//! Each node runs as its own tokio task. Readiness is modeled with one
//! `tokio::sync::watch` channel per node: a node's task awaits every
//! incoming dependency's channel reaching a terminal value before doing
//! anything else, which is the channel-based analogue of the "condition
//! variable plus ready-set queue" the design calls for — no userland
//! scheduler loop, no busy polling beyond the channel's own wakeups.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};

use crate::config::Task;
use crate::context::CancellationToken;
use crate::core::cache::{CacheEntry, CacheStore};
use crate::core::condition;
use crate::core::fingerprint::{self, DigestCache};
use crate::core::formatter::{Event, Sink};
use crate::core::graph::Graph;
use crate::core::history::{HistoryLog, HistoryRecord, HistoryStatus};
use crate::system::shell::{self, StreamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// Skipped because its `condition` evaluated false. Does not block
    /// dependents from being considered "finished".
    Skipped,
    /// Skipped because a non-`allow_failure` dependency failed (§4.6.2
    /// step 2). Propagates as a failed dependency to further dependents,
    /// same as the `Failed` it descends from.
    SkippedUpstream,
    CacheHit,
    Cancelled,
}


pub struct RunOptions {
    pub jobs: usize,
    pub dry_run: bool,
    pub process_env: BTreeMap<String, String>,
    pub profile_env: BTreeMap<String, String>,
    pub profile_name: Option<String>,
    pub tool_versions: BTreeMap<String, String>,
    pub revision: Option<String>,
    pub project_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct NodeResult {
    pub name: String,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
}

pub struct RunReport {
    pub results: Vec<NodeResult>,
}

impl RunReport {
    /// §4.6.3: overall success iff every terminal task is
    /// `Succeeded|CacheHit|Skipped-by-condition`, or every `Failed` task
    /// had `allow_failure` (already converted to `Succeeded`-shaped
    /// bookkeeping below, so a bare `Failed` here is always disqualifying).
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| {
            !matches!(
                r.status,
                TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::SkippedUpstream
            )
        })
    }
}

fn merge_env(
    process_env: &BTreeMap<String, String>,
    profile_env: &BTreeMap<String, String>,
    task_env: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = process_env.clone();
    merged.extend(profile_env.clone());
    merged.extend(task_env.clone());
    merged
}

fn resolve_cwd(project_root: &Path, task: &Task) -> PathBuf {
    match &task.cwd {
        Some(rel) => project_root.join(rel),
        None => project_root.to_path_buf(),
    }
}

/// Per-node shared wiring: one watch channel per node so dependents can
/// await completion without polling, plus the handful of process-wide
/// resources every node needs read access to.
struct Shared<'a> {
    graph: &'a Graph,
    senders: Vec<watch::Sender<Option<TaskStatus>>>,
    receivers: Vec<watch::Receiver<Option<TaskStatus>>>,
    results: Vec<tokio::sync::Mutex<Option<NodeResult>>>,
    jobs: Arc<Semaphore>,
    group_semaphores: BTreeMap<String, Arc<Semaphore>>,
    cache: Arc<CacheStore>,
    history: Arc<HistoryLog>,
    digests: Arc<DigestCache>,
    sink: Arc<dyn Sink>,
    cancellation: CancellationToken,
    options: Arc<RunOptions>,
}

async fn await_dependency(shared: &Shared<'_>, dep_idx: usize) -> TaskStatus {
    let mut rx = shared.receivers[dep_idx].clone();
    loop {
        if let Some(status) = *rx.borrow() {
            return status;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without ever sending: treat as failed so we
            // never wait forever on a node that panicked before finishing.
            return TaskStatus::Failed;
        }
    }
}

async fn run_node(shared: Arc<Shared<'_>>, idx: usize) {
    let node = shared.graph.node(idx);
    let task = node.task.clone();

    // Step 0: wait for every dependency (parallel + realized serial chain)
    // to reach a terminal state before evaluating anything else.
    let mut dep_statuses = Vec::with_capacity(node.incoming.len());
    for &dep in &node.incoming {
        dep_statuses.push((dep, await_dependency(&shared, dep).await));
    }

    let condition_expr = task.condition.as_deref().map(condition::parse).transpose();
    let condition_expr = match condition_expr {
        Ok(expr) => expr,
        Err(_) => {
            // Malformed condition: treated the same as upstream failure —
            // fatal to this node (it is fatal for the whole `run` verb
            // before any task starts, per §7; the caller validates this
            // earlier, so reaching here with a bad expression is a bug,
            // but we fail safe rather than panic).
            finish(&shared, idx, &task, TaskStatus::Failed, None).await;
            return;
        }
    };

    let effective_env = merge_env(
        &shared.options.process_env,
        &shared.options.profile_env,
        &task.env,
    );
    let is_always = condition_expr.as_ref().is_some_and(condition::is_always);
    let condition_true = condition_expr
        .as_ref()
        .map(|e| condition::eval(e, &effective_env))
        .unwrap_or(true);

    // Step 1: condition check.
    if !condition_true && !is_always {
        shared.sink.emit(&Event::TaskEnded {
            task: task.name.clone(),
            status: HistoryStatus::Skipped,
            duration_ms: 0,
            exit_code: None,
            cache_hit: false,
        });
        write_history(&shared, &task, HistoryStatus::Skipped, None, false, 0).await;
        finish(&shared, idx, &task, TaskStatus::Skipped, None).await;
        return;
    }

    // Step 2: upstream-failure rule. A non-allow_failure dependency that is
    // `Failed`/`Cancelled`/`SkippedUpstream` blocks this node unless the
    // condition is `always`; `SkippedUpstream` must itself block further
    // dependents so the cascade propagates past the first hop.
    let upstream_blocked = dep_statuses.iter().any(|(dep_idx, status)| {
        let dep_task = &shared.graph.node(*dep_idx).task;
        matches!(
            status,
            TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::SkippedUpstream
        ) && !dep_task.allow_failure
    });
    if upstream_blocked && !is_always {
        shared.sink.emit(&Event::TaskEnded {
            task: task.name.clone(),
            status: HistoryStatus::Skipped,
            duration_ms: 0,
            exit_code: None,
            cache_hit: false,
        });
        write_history(&shared, &task, HistoryStatus::Skipped, None, false, 0).await;
        finish(&shared, idx, &task, TaskStatus::SkippedUpstream, None).await;
        return;
    }

    if crate::context::is_cancelled(&shared.cancellation) {
        finish(&shared, idx, &task, TaskStatus::Cancelled, None).await;
        return;
    }

    let cwd = resolve_cwd(&shared.options.project_root, &task);

    // Step 3: fingerprint + cache probe (computed once, not per attempt).
    let cache_spec = task.cache.clone();
    let fp = cache_spec.as_ref().map(|_| {
        fingerprint::fingerprint_task(
            &task,
            &task.cmd,
            &effective_env,
            &cwd,
            &shared.options.tool_versions,
            &shared.digests,
        )
    });

    if let Some(fp) = &fp {
        if let Some(entry) = shared.cache.lookup(fp) {
            if shared.cache.restore_outputs(&entry, &cwd).is_ok() {
                shell::replay(&entry.stdout, &entry.stderr).await.ok();
                shared.sink.emit(&Event::TaskEnded {
                    task: task.name.clone(),
                    status: HistoryStatus::CacheHit,
                    duration_ms: 0,
                    exit_code: Some(entry.exit_code),
                    cache_hit: true,
                });
                write_history(&shared, &task, HistoryStatus::CacheHit, Some(entry.exit_code), true, 1)
                    .await;
                store_result(&shared, idx, NodeResult {
                    name: task.name.clone(),
                    status: TaskStatus::CacheHit,
                    exit_code: Some(entry.exit_code),
                })
                .await;
                return;
            }
            // Missing/invalid blob: degrade to miss, per §4.5/§7.
        }
    }

    // Acquire the bounded worker-pool permit and, if this node is a matrix
    // variant with `max_concurrent`, its group permit too. Acquired once
    // for the whole attempt loop, released when the node is fully done.
    let _job_permit = shared.jobs.acquire().await.expect("job semaphore closed");
    let _group_permit = match &task.variant_of {
        Some((base, _)) => match shared.group_semaphores.get(base) {
            Some(sem) => Some(sem.clone().acquire_owned().await.expect("group semaphore closed")),
            None => None,
        },
        None => None,
    };

    if shared.options.dry_run {
        shared.sink.emit(&Event::TaskStarted {
            task: task.name.clone(),
            attempt: 1,
        });
        shared.sink.emit(&Event::TaskEnded {
            task: task.name.clone(),
            status: HistoryStatus::Succeeded,
            duration_ms: 0,
            exit_code: Some(0),
            cache_hit: false,
        });
        finish(&shared, idx, &task, TaskStatus::Succeeded, Some(0)).await;
        return;
    }

    let max_attempts = 1 + task.retry;
    let mut last_outcome = None;
    for attempt in 1..=max_attempts {
        if crate::context::is_cancelled(&shared.cancellation) {
            finish(&shared, idx, &task, TaskStatus::Cancelled, None).await;
            write_history(&shared, &task, HistoryStatus::Cancelled, None, false, attempt).await;
            return;
        }

        shared.sink.emit(&Event::TaskStarted {
            task: task.name.clone(),
            attempt,
        });

        let start = Utc::now();
        let task_name = task.name.clone();
        let sink = shared.sink.clone();
        let outcome = shell::execute(
            &task.cmd,
            &cwd,
            &effective_env,
            task.timeout_ms,
            &shared.cancellation,
            move |stream, bytes| {
                sink.emit(&Event::Line {
                    task: task_name.clone(),
                    stream: match stream {
                        StreamKind::Stdout => "stdout",
                        StreamKind::Stderr => "stderr",
                    },
                    text: String::from_utf8_lossy(bytes).into_owned(),
                });
            },
        )
        .await;
        let end = Utc::now();

        let outcome = match outcome {
            Ok(o) => o,
            // Spawn failure (e.g. shell not found): treat as a failed
            // attempt so retry/allow_failure semantics still apply.
            Err(_) => shell::ExecutionOutcome::default(),
        };

        let duration_ms = u64::try_from((end - start).num_milliseconds().max(0)).unwrap_or(0);
        let history_status = if outcome.cancelled {
            HistoryStatus::Cancelled
        } else if outcome.timed_out {
            HistoryStatus::Timeout
        } else if outcome.succeeded() {
            HistoryStatus::Succeeded
        } else {
            HistoryStatus::Failed
        };

        shared.sink.emit(&Event::TaskEnded {
            task: task.name.clone(),
            status: history_status,
            duration_ms,
            exit_code: outcome.exit_code,
            cache_hit: false,
        });
        write_history(&shared, &task, history_status, outcome.exit_code, false, attempt).await;

        if outcome.succeeded() {
            if let Some(fp) = &fp {
                if let Some(spec) = &cache_spec {
                    let output_files = collect_outputs(&cwd, spec.outputs());
                    let entry = CacheEntry {
                        exit_code: outcome.exit_code.unwrap_or(0),
                        stdout: outcome.stdout.clone(),
                        stderr: outcome.stderr.clone(),
                        output_files,
                        timestamp_unix_ms: Utc::now().timestamp_millis(),
                    };
                    let _ = shared.cache.store(fp, &entry);
                }
            }
            finish(&shared, idx, &task, TaskStatus::Succeeded, outcome.exit_code).await;
            return;
        }

        if outcome.cancelled {
            finish(&shared, idx, &task, TaskStatus::Cancelled, outcome.exit_code).await;
            return;
        }

        last_outcome = Some(outcome);
        // Loop to next attempt if any remain; retries do not re-check the
        // condition and do not re-compute the fingerprint (§4.6.2 step 6).
    }

    let exit_code = last_outcome.and_then(|o| o.exit_code);
    if task.allow_failure {
        finish(&shared, idx, &task, TaskStatus::Succeeded, exit_code).await;
    } else {
        finish(&shared, idx, &task, TaskStatus::Failed, exit_code).await;
    }
}

fn collect_outputs(cwd: &Path, patterns: &[String]) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for pattern in patterns {
        for path in crate::core::glob::expand(cwd, pattern) {
            if let Ok(bytes) = std::fs::read(&path) {
                let rel = path
                    .strip_prefix(cwd)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .into_owned();
                files.push((rel, bytes));
            }
        }
    }
    files
}

async fn write_history(
    shared: &Shared<'_>,
    task: &Task,
    status: HistoryStatus,
    exit_code: Option<i32>,
    cache_hit: bool,
    attempt: u32,
) {
    if shared.options.dry_run {
        return;
    }
    let now = Utc::now();
    let record = HistoryRecord {
        task_name: task.name.clone(),
        start: now,
        end: now,
        exit_code,
        status,
        cache_hit,
        attempt,
        profile: shared.options.profile_name.clone(),
        revision: shared.options.revision.clone(),
    };
    let _ = shared.history.append(&record);
}

async fn finish(
    shared: &Shared<'_>,
    idx: usize,
    task: &Task,
    status: TaskStatus,
    exit_code: Option<i32>,
) {
    log::info!("task '{}' finished as {:?}", task.name, status);
    store_result(
        shared,
        idx,
        NodeResult {
            name: task.name.clone(),
            status,
            exit_code,
        },
    )
    .await;
    let _ = shared.senders[idx].send(Some(status));
}

async fn store_result(shared: &Shared<'_>, idx: usize, result: NodeResult) {
    *shared.results[idx].lock().await = Some(result);
}

/// Walks `graph` to completion, honoring jobs/retry/timeout/allow_failure/
/// condition/cache. Every discovered node runs as its own tokio task; the
/// function itself awaits all of them and returns the aggregated report.
pub async fn run(
    graph: &Graph,
    options: RunOptions,
    cache: Arc<CacheStore>,
    history: Arc<HistoryLog>,
    sink: Arc<dyn Sink>,
    cancellation: CancellationToken,
) -> RunReport {
    let n = graph.nodes.len();
    let mut senders = Vec::with_capacity(n);
    let mut receivers = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = watch::channel(None);
        senders.push(tx);
        receivers.push(rx);
    }

    let mut group_limits: BTreeMap<String, usize> = BTreeMap::new();
    for node in &graph.nodes {
        if let (Some((base, _)), Some(limit)) = (&node.task.variant_of, node.task.max_concurrent) {
            group_limits
                .entry(base.clone())
                .and_modify(|existing| *existing = (*existing).min(limit))
                .or_insert(limit);
        }
    }
    let group_semaphores = group_limits
        .into_iter()
        .map(|(name, limit)| (name, Arc::new(Semaphore::new(limit.max(1)))))
        .collect();

    let results = (0..n).map(|_| tokio::sync::Mutex::new(None)).collect();

    let shared = Arc::new(Shared {
        graph,
        senders,
        receivers,
        results,
        jobs: Arc::new(Semaphore::new(options.jobs.max(1))),
        group_semaphores,
        cache,
        history,
        digests: Arc::new(DigestCache::new()),
        sink,
        cancellation,
        options: Arc::new(options),
    });

    // `Shared` borrows `graph`, which does not outlive this function, so
    // nodes are driven by a scoped set of futures rather than detached
    // `tokio::spawn` tasks (which would require `'static`). Concurrency is
    // unaffected: all `n` futures are polled concurrently by `join_all`,
    // and each still respects the jobs/group semaphores above.
    let futures = (0..n).map(|idx| run_node(shared.clone(), idx));
    futures::future::join_all(futures).await;

    let mut results = Vec::with_capacity(n);
    for slot in &shared.results {
        if let Some(result) = slot.lock().await.clone() {
            results.push(result);
        }
    }
    RunReport { results }
}
