//! Filenames and on-disk layout constants shared across the crate.

/// Name of the configuration file searched for when `--config` is not given.
pub const CONFIG_FILENAME: &str = "zr.toml";

/// Per-project state directory, created lazily on first cache or history write.
pub const STATE_DIR: &str = ".zr";

/// Cache entries live under `STATE_DIR/CACHE_DIR/<xx>/<rest>.entry`.
pub const CACHE_DIR: &str = "cache";

/// Cache entry file extension.
pub const CACHE_ENTRY_EXT: &str = "entry";

/// Append-only history log, one JSON object per line.
pub const HISTORY_FILENAME: &str = "history.jsonl";

/// Per-user alias store, resolved via `dirs::config_dir()`.
pub const USER_CONFIG_SUBDIR: &str = "zr";
pub const USER_ALIASES_FILENAME: &str = "aliases.toml";

/// Default alias expansion / alias-cycle depth cap (see §4.3 of the design).
pub const MAX_ALIAS_DEPTH: usize = 16;

/// Number of leading hex characters used as the cache shard directory name.
pub const CACHE_SHARD_PREFIX_LEN: usize = 2;
