//! Explicit, threaded-through run context.
//!
//! The prior generation of this tool kept its mutable state behind a
//! process-wide `OnceLock<Mutex<...>>` singleton. That pattern doesn't carry
//! over cleanly: a task runner may legitimately be driven as a library from
//! multiple call sites in the same process (tests being the obvious case),
//! so `Context` is built once per invocation and passed by reference instead.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cli::Format;
use crate::core::cache::CacheStore;
use crate::core::history::HistoryLog;

/// Shared cancellation flag. Cloned cheaply; set once by the Ctrl-C handler
/// and observed by every worker and the child-polling loop.
pub type CancellationToken = Arc<AtomicBool>;

pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(std::sync::atomic::Ordering::SeqCst)
}

/// Everything a scheduler run needs that isn't part of the graph itself:
/// where state lives on disk, how many workers to use, and how to render
/// output. Constructed once in `main` and passed down by reference.
#[derive(Debug)]
pub struct Context {
    /// Directory containing the resolved `zr.toml` (config's parent dir).
    pub project_root: PathBuf,
    /// Root of persisted state (`project_root/.zr` unless overridden).
    pub state_dir: PathBuf,
    pub cache: CacheStore,
    pub history: HistoryLog,
    pub jobs: usize,
    pub format: Format,
    pub dry_run: bool,
    pub no_color: bool,
    pub quiet: bool,
    pub cancellation: CancellationToken,
}

impl Context {
    pub fn new(
        project_root: PathBuf,
        state_dir: PathBuf,
        jobs: usize,
        format: Format,
        dry_run: bool,
        no_color: bool,
    ) -> Self {
        let cache = CacheStore::new(state_dir.join(crate::constants::CACHE_DIR));
        let history = HistoryLog::new(state_dir.join(crate::constants::HISTORY_FILENAME));
        Self {
            project_root,
            state_dir,
            cache,
            history,
            jobs,
            format,
            dry_run,
            no_color,
            quiet: false,
            cancellation: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `--quiet` is applied after construction since the flag lives on
    /// `Cli`, not in the constructor's narrower argument list.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Replaces the default, unshared cancellation flag with the one `main`
    /// wired to its ctrl-c handler, so pressing ctrl-c actually reaches the
    /// scheduler driving this context.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}
