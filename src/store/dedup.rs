//! Seen-mention store: the append-only set of handled mention keys.
//!
//! Persisted as a JSON array of strings in insertion order at
//! `{data_dir}/accounts/{handle}/seen_mentions.json`, rewritten after every
//! mutation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{read_json, write_json_atomic};

#[derive(Debug)]
pub struct SeenMentionStore {
    path: PathBuf,
    order: Vec<String>,
    keys: HashSet<String>,
    read_only: bool,
}

impl SeenMentionStore {
    /// Load the store at `path`; a missing or corrupt file yields an empty set.
    ///
    /// A corrupt file is moved aside first. If the file cannot be read or
    /// moved, the store runs in memory only and never writes to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (order, read_only): (Vec<String>, bool) = match read_json(&path, "seen_mentions") {
            Ok(order) => (order.unwrap_or_default(), false),
            Err(_) => {
                warn!(
                    "seen_mentions: {} left untouched; keys marked this run will not be persisted",
                    path.display()
                );
                (Vec::new(), true)
            }
        };
        let mut keys = HashSet::with_capacity(order.len());
        let order: Vec<String> = order.into_iter().filter(|k| keys.insert(k.clone())).collect();
        debug!("seen_mentions: {} keys loaded from {}", order.len(), path.display());
        Self {
            path,
            order,
            keys,
            read_only,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Record `key` as handled and persist. Returns `false` if it was already known.
    ///
    /// A failed write is logged; the key stays marked in memory.
    pub fn mark_seen(&mut self, key: &str) -> bool {
        if !self.keys.insert(key.to_string()) {
            return false;
        }
        self.order.push(key.to_string());
        if self.read_only {
            debug!("seen_mentions: {} kept in memory only", key);
        } else if let Err(e) = write_json_atomic(&self.path, &self.order) {
            warn!("seen_mentions: failed to persist {}: {}", self.path.display(), e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_seen_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice").join("seen_mentions.json");

        let mut store = SeenMentionStore::load(&path);
        assert!(store.is_empty());
        assert!(store.mark_seen("k2"));
        assert!(store.mark_seen("k1"));
        assert!(!store.mark_seen("k2"));
        assert_eq!(store.len(), 2);

        let raw: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["k2", "k1"]);

        let reloaded = SeenMentionStore::load(&path);
        assert!(reloaded.contains("k1"));
        assert!(reloaded.contains("k2"));
        assert!(!reloaded.contains("k3"));
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["k2", "k1"]);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_mentions.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SeenMentionStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_history_survives_next_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_mentions.json");
        let damaged = r#"["k1","k2"]x"#;
        std::fs::write(&path, damaged).unwrap();

        let mut store = SeenMentionStore::load(&path);
        assert!(store.is_empty());
        assert!(store.mark_seen("k3"));

        let kept = dir.path().join("seen_mentions.json.corrupt");
        assert_eq!(
            std::fs::read_to_string(&kept).unwrap(),
            damaged,
            "the damaged history must be preserved for recovery"
        );
        let raw: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["k3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_mentions.json");
        // A directory in place of the file: reading fails, renaming is never attempted.
        std::fs::create_dir(&path).unwrap();

        let mut store = SeenMentionStore::load(&path);
        assert!(store.mark_seen("k1"));
        assert!(store.contains("k1"));
        assert!(path.is_dir(), "store must not replace what it could not read");
    }

    #[test]
    fn test_duplicate_entries_on_disk_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_mentions.json");
        std::fs::write(&path, r#"["a","b","a"]"#).unwrap();
        let store = SeenMentionStore::load(&path);
        assert_eq!(store.len(), 2);
    }
}
