//! Component E: Cache Store. A content-addressed key/value store keyed by
//! [`Fingerprint`], sharded on disk the way the persisted-state layout
//! specifies, written atomically via temp-file-then-rename so a crash mid
//! write can only ever leave the old entry (or no entry), never a
//! half-written one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CACHE_ENTRY_EXT, CACHE_SHARD_PREFIX_LEN};
use crate::core::fingerprint::Fingerprint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Output files captured for the struct form of `cache`, as
    /// `(relative path, content)`. Empty for `cache = true`.
    pub output_files: Vec<(String, Vec<u8>)>,
    pub timestamp_unix_ms: i64,
}

#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, fp: &Fingerprint) -> PathBuf {
        let hex = fp.to_hex();
        let (shard, rest) = hex.split_at(CACHE_SHARD_PREFIX_LEN);
        self.root
            .join(shard)
            .join(format!("{rest}.{CACHE_ENTRY_EXT}"))
    }

    /// Lock-free read: any I/O or deserialization failure silently degrades
    /// to a miss, per the cache-is-a-hint recovery policy.
    pub fn lookup(&self, fp: &Fingerprint) -> Option<CacheEntry> {
        let path = self.entry_path(fp);
        let bytes = std::fs::read(path).ok()?;
        let (entry, _) =
            bincode::serde::decode_from_slice::<CacheEntry, _>(&bytes, bincode::config::standard())
                .ok()?;
        Some(entry)
    }

    /// Atomic write: serialize to a temp file in the same shard directory,
    /// then rename into place. The worst case under a crash is a missing or
    /// stale entry (re-execution), never a corrupt one.
    pub fn store(&self, fp: &Fingerprint, entry: &CacheEntry) -> std::io::Result<()> {
        let path = self.entry_path(fp);
        let shard_dir = path.parent().expect("entry path always has a parent");
        std::fs::create_dir_all(shard_dir)?;

        let bytes = bincode::serde::encode_to_vec(entry, bincode::config::standard())
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(shard_dir)?;
        std::fs::write(tmp.path(), &bytes)?;
        tmp.persist(&path)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(())
    }

    /// Restores an entry's captured output files under `cwd`. A listed
    /// output whose blob somehow failed to write degrades the whole entry
    /// to a miss, per §4.5 ("a missing blob invalidates the entry").
    pub fn restore_outputs(&self, entry: &CacheEntry, cwd: &Path) -> std::io::Result<()> {
        for (rel, content) in &entry.output_files {
            let dest = cwd.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, content)?;
        }
        Ok(())
    }

    /// Removes every entry under the store root; used by the `clean`
    /// command (outside the core command surface, but the store owns its
    /// own directory layout so it owns wiping it too).
    pub fn prune_all(&self) -> std::io::Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint([byte; 32])
    }

    #[test]
    fn round_trips_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let entry = CacheEntry {
            exit_code: 0,
            stdout: b"hello".to_vec(),
            stderr: Vec::new(),
            output_files: Vec::new(),
            timestamp_unix_ms: 0,
        };
        store.store(&fp(1), &entry).unwrap();
        let back = store.lookup(&fp(1)).unwrap();
        assert_eq!(back.stdout, b"hello");
        assert_eq!(back.exit_code, 0);
    }

    #[test]
    fn miss_on_unknown_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        assert!(store.lookup(&fp(9)).is_none());
    }

    #[test]
    fn overwrite_with_new_value_is_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let first = CacheEntry {
            exit_code: 0,
            stdout: b"first".to_vec(),
            stderr: Vec::new(),
            output_files: Vec::new(),
            timestamp_unix_ms: 0,
        };
        let second = CacheEntry {
            stdout: b"second".to_vec(),
            ..first.clone()
        };
        store.store(&fp(2), &first).unwrap();
        store.store(&fp(2), &second).unwrap();
        assert_eq!(store.lookup(&fp(2)).unwrap().stdout, b"second");
    }

    #[test]
    fn restores_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let entry = CacheEntry {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            output_files: vec![("out/result.txt".to_string(), b"payload".to_vec())],
            timestamp_unix_ms: 0,
        };
        let cwd = dir.path().join("work");
        std::fs::create_dir_all(&cwd).unwrap();
        store.restore_outputs(&entry, &cwd).unwrap();
        let restored = std::fs::read(cwd.join("out/result.txt")).unwrap();
        assert_eq!(restored, b"payload");
    }
}
