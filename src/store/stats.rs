//! Per-account activity counters, persisted at
//! `{data_dir}/accounts/{handle}/stats.json`.

use crate::core::types::{CycleSummary, InteractionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use super::interaction_log::InteractionAction;
use super::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub replies_sent: u64,
    #[serde(default)]
    pub comments_sent: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cycles: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl ProfileStats {
    pub fn record(&mut self, action: InteractionAction, result: InteractionResult) {
        match (result, action) {
            (InteractionResult::Success, InteractionAction::Reply) => self.replies_sent += 1,
            (InteractionResult::Success, InteractionAction::Comment) => self.comments_sent += 1,
            (InteractionResult::Skipped, _) => self.skipped += 1,
            (InteractionResult::Failed, _) => self.failed += 1,
        }
    }

    pub fn record_cycle(&mut self, at: DateTime<Utc>) {
        self.cycles += 1;
        self.last_cycle_at = Some(at);
    }
}

#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    stats: ProfileStats,
    read_only: bool,
}

impl StatsStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (stats, read_only): (ProfileStats, bool) = match read_json(&path, "stats") {
            Ok(stats) => (stats.unwrap_or_default(), false),
            Err(_) => {
                warn!("stats: {} left untouched; counters will not be persisted", path.display());
                (ProfileStats::default(), true)
            }
        };
        Self {
            path,
            stats,
            read_only,
        }
    }

    pub fn stats(&self) -> &ProfileStats {
        &self.stats
    }

    pub fn record(&mut self, action: InteractionAction, result: InteractionResult) {
        self.stats.record(action, result);
        self.persist();
    }

    /// Close out a monitor cycle. Per-mention outcomes are already counted.
    pub fn finish_cycle(&mut self, summary: &CycleSummary) {
        self.stats.record_cycle(Utc::now());
        tracing::debug!(
            "stats: cycle {} done ({} discovered)",
            self.stats.cycles,
            summary.discovered
        );
        self.persist();
    }

    fn persist(&self) {
        if self.read_only {
            return;
        }
        if let Err(e) = write_json_atomic(&self.path, &self.stats) {
            warn!("stats: failed to persist {}: {}", self.path.display(), e);
        }
    }
}
