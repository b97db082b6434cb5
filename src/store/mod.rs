//! Per-account persistence: dedup keys, counters and the shared CSV log.
//!
//! JSON files are written atomically (write to `{path}.tmp`, then rename) so
//! a crash mid-write never leaves a truncated store behind. A store that
//! fails to parse is moved aside to `{name}.corrupt` before anything new is
//! written over it.

pub mod dedup;
pub mod interaction_log;
pub mod stats;

pub use dedup::SeenMentionStore;
pub use interaction_log::{InteractionAction, InteractionLog, InteractionRecord};
pub use stats::{ProfileStats, StatsStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Serialize `value` as pretty JSON and move it into place atomically.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// Read a JSON file. A missing file is `Ok(None)`.
///
/// A file that fails to parse is renamed to `{name}.corrupt` (or
/// `{name}.corrupt.N` when that exists) and reported as absent, so the next
/// write cannot destroy it. Read errors, and a quarantine rename that fails,
/// come back as `Err`; callers must not overwrite the file in that case.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, label: &str) -> std::io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("{}: failed to read {}: {}", label, path.display(), e);
        e
    })?;
    match serde_json::from_str(&content) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            let quarantine = quarantine_path(path);
            std::fs::rename(path, &quarantine).map_err(|re| {
                warn!(
                    "{}: {} is corrupt ({}) and could not be moved aside: {}",
                    label,
                    path.display(),
                    e,
                    re
                );
                re
            })?;
            warn!(
                "{}: failed to parse {}: {} (moved to {}, starting fresh)",
                label,
                path.display(),
                e,
                quarantine.display()
            );
            Ok(None)
        }
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    let first = path.with_file_name(&name);
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| {
            let mut numbered = name.clone();
            numbered.push(format!(".{}", n));
            path.with_file_name(numbered)
        })
        .find(|p| !p.exists())
        .unwrap_or(first)
}
