//! Component B (fingerprint half): 256-bit content fingerprinting for the
//! cache. Grounded in the same blake3-over-file-bytes approach the original
//! cache validation used, generalized to the full canonical tuple the design
//! calls for (command, env, cwd, input digests, platform, task name).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Task;
use crate::core::condition::current_platform;
use crate::core::glob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Memoizes `(path, mtime, size) -> digest` for the lifetime of one
/// invocation, as required by the fingerprint spec. Cheap to share across
/// the worker pool behind a mutex: file digesting is I/O-bound, not a
/// contention hotspot.
#[derive(Debug, Default)]
pub struct DigestCache {
    entries: Mutex<BTreeMap<(PathBuf, u128, u64), String>>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest_file(&self, path: &Path) -> std::io::Result<String> {
        let metadata = std::fs::metadata(path)?;
        let size = metadata.len();
        let mtime = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let key = (path.to_path_buf(), mtime, size);

        if let Some(hit) = self.entries.lock().expect("digest cache poisoned").get(&key) {
            return Ok(hit.clone());
        }

        let bytes = std::fs::read(path)?;
        let digest = blake3::hash(&bytes).to_hex().to_string();
        self.entries
            .lock()
            .expect("digest cache poisoned")
            .insert(key, digest.clone());
        Ok(digest)
    }

    /// Expands `task.cache.inputs` globs against `cwd` and digests every
    /// matching file, returning `(relative-ish path, digest)` pairs sorted
    /// by path for determinism. A file that disappears mid-scan is simply
    /// skipped; caching is a hint, never a correctness requirement.
    pub fn input_digests(&self, cwd: &Path, patterns: &[String]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for pattern in patterns {
            for path in glob::expand(cwd, pattern) {
                if let Ok(digest) = self.digest_file(&path) {
                    let rel = path
                        .strip_prefix(cwd)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    pairs.push((rel, digest));
                }
            }
        }
        pairs.sort();
        pairs
    }
}

/// Tool versions folded into the fingerprint so a toolchain upgrade
/// invalidates previously cached results; only `rustc`-style components
/// the config names under `[tools]` participate.
pub struct FingerprintInputs<'a> {
    pub resolved_cmd: &'a str,
    pub merged_env: &'a BTreeMap<String, String>,
    pub cwd: &'a Path,
    pub input_digests: &'a [(String, String)],
    pub tool_versions: &'a BTreeMap<String, String>,
    pub task_name: &'a str,
}

/// Computes the canonical byte serialization and hashes it with blake3,
/// producing the 256-bit fingerprint. Every field is written behind a
/// length-prefixed tag so no ambiguity between e.g. an empty env and an
/// empty input list can collide two distinct canonical forms.
pub fn compute(inputs: &FingerprintInputs<'_>) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    let mut feed = |label: &str, value: &str| {
        hasher.update(label.as_bytes());
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    };

    feed("cmd", inputs.resolved_cmd);
    feed("cwd", &inputs.cwd.to_string_lossy());
    feed("platform", current_platform());
    feed("task", inputs.task_name);

    for (k, v) in inputs.merged_env {
        feed("env.k", k);
        feed("env.v", v);
    }
    for (path, digest) in inputs.input_digests {
        feed("input.path", path);
        feed("input.digest", digest);
    }
    for (tool, version) in inputs.tool_versions {
        feed("tool.k", tool);
        feed("tool.v", version);
    }

    Fingerprint(*hasher.finalize().as_bytes())
}

/// Convenience wrapper computing a task's fingerprint from its resolved
/// command, merged environment and cwd, looking up cache inputs via the
/// digest cache.
pub fn fingerprint_task(
    task: &Task,
    resolved_cmd: &str,
    merged_env: &BTreeMap<String, String>,
    cwd: &Path,
    tool_versions: &BTreeMap<String, String>,
    digests: &DigestCache,
) -> Fingerprint {
    let input_digests = task
        .cache
        .as_ref()
        .map(|c| digests.input_digests(cwd, c.inputs()))
        .unwrap_or_default();

    compute(&FingerprintInputs {
        resolved_cmd,
        merged_env,
        cwd,
        input_digests: &input_digests,
        tool_versions,
        task_name: &task.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn stable_across_identical_inputs() {
        let cwd = PathBuf::from("/tmp/project");
        let tools = BTreeMap::new();
        let a = compute(&FingerprintInputs {
            resolved_cmd: "echo hi",
            merged_env: &env(&[("A", "1")]),
            cwd: &cwd,
            input_digests: &[],
            tool_versions: &tools,
            task_name: "t",
        });
        let b = compute(&FingerprintInputs {
            resolved_cmd: "echo hi",
            merged_env: &env(&[("A", "1")]),
            cwd: &cwd,
            input_digests: &[],
            tool_versions: &tools,
            task_name: "t",
        });
        assert_eq!(a, b);
    }

    #[test]
    fn differs_when_command_differs() {
        let cwd = PathBuf::from("/tmp/project");
        let tools = BTreeMap::new();
        let a = compute(&FingerprintInputs {
            resolved_cmd: "echo hi",
            merged_env: &env(&[]),
            cwd: &cwd,
            input_digests: &[],
            tool_versions: &tools,
            task_name: "t",
        });
        let b = compute(&FingerprintInputs {
            resolved_cmd: "echo bye",
            merged_env: &env(&[]),
            cwd: &cwd,
            input_digests: &[],
            tool_versions: &tools,
            task_name: "t",
        });
        assert_ne!(a, b);
    }

    #[test]
    fn digest_cache_memoizes_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("input.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        f.write_all(b"hello world").unwrap();
        drop(f);

        let cache = DigestCache::new();
        let first = cache.input_digests(dir.path(), &["input.txt".to_string()]);
        let second = cache.input_digests(dir.path(), &["input.txt".to_string()]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
