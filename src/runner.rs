//! Run modes: continuous monitoring, a one-shot comment test, and an
//! interactive login check.

use crate::core::config::{AccountConfig, BotConfig};
use crate::core::types::{CycleSummary, InteractionResult};
use crate::generator::ContentGenerator;
use crate::human::PauseToken;
use crate::orchestrator::{MentionOrchestrator, OrchestratorError};
use crate::surface::{SurfaceLauncher, UiSurface};
use anyhow::{anyhow, Context, Result};
use rand::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Gap between two accounts within one monitor pass.
pub const INTER_ACCOUNT_DELAY_MS: (u64, u64) = (8_000, 20_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Monitor,
    Test,
    Check,
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monitor" => Ok(Self::Monitor),
            "test" => Ok(Self::Test),
            "check" => Ok(Self::Check),
            other => Err(anyhow!("unknown mode '{}' (expected monitor|test|check)", other)),
        }
    }
}

/// What the runner needs besides config: how to get a browser and how to
/// write text.
#[derive(Clone)]
pub struct RunContext {
    pub launcher: Arc<dyn SurfaceLauncher>,
    pub generator: Arc<dyn ContentGenerator>,
    pub pause: PauseToken,
}

impl RunContext {
    async fn open(&self, config: &BotConfig, account: &AccountConfig) -> Result<(Arc<dyn UiSurface>, MentionOrchestrator)> {
        let surface = self
            .launcher
            .launch(account)
            .await
            .with_context(|| format!("failed to launch browser for {}", account.handle()))?;
        let orchestrator = MentionOrchestrator::new(
            config,
            account.clone(),
            Arc::clone(&surface),
            Arc::clone(&self.generator),
            self.pause.clone(),
        );
        Ok((surface, orchestrator))
    }
}

async fn close_quietly(surface: &Arc<dyn UiSurface>, handle: &str) {
    if let Err(e) = surface.close().await {
        warn!("browser close for {} failed (non-fatal): {}", handle, e);
    }
}

fn lookup_account<'a>(config: &'a BotConfig, username: &str) -> Result<&'a AccountConfig> {
    config
        .account(username)
        .ok_or_else(|| anyhow!("account '{}' is not configured", username))
}

/// One round-robin pass over every configured account.
///
/// Launch and login problems are isolated to their account; an error from
/// the cycle itself (e.g. an unwritable data directory) aborts the pass.
pub async fn run_monitor_pass(config: &BotConfig, ctx: &RunContext) -> Result<Vec<(String, CycleSummary)>> {
    let mut results = Vec::new();
    let total = config.accounts.len();
    for (i, account) in config.accounts.iter().enumerate() {
        let handle = account.handle();
        info!("👤 [{}/{}] {}", i + 1, total, handle);

        match ctx.open(config, account).await {
            Err(e) => error!("{:#}", e),
            Ok((surface, mut orchestrator)) => {
                let outcome = match orchestrator.initialize().await {
                    Ok(()) => orchestrator.run_cycle().await.map(Some),
                    Err(e @ OrchestratorError::Initialization(_)) => {
                        error!("{}: {}", handle, e);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                };
                close_quietly(&surface, &handle).await;
                if let Some(summary) = outcome.with_context(|| format!("monitor cycle for {} aborted", handle))? {
                    results.push((handle.clone(), summary));
                }
            }
        }

        if i + 1 < total {
            ctx.pause.check_for_pause().await;
            let gap = rand::rng().random_range(INTER_ACCOUNT_DELAY_MS.0..=INTER_ACCOUNT_DELAY_MS.1);
            info!("⏳ next account in {:.1}s", gap as f64 / 1000.0);
            tokio::time::sleep(Duration::from_millis(gap)).await;
        }
    }
    Ok(results)
}

/// Monitor every account forever, sleeping a random poll interval between passes.
pub async fn run_monitor(config: &BotConfig, ctx: &RunContext) -> Result<()> {
    if config.accounts.is_empty() {
        return Err(anyhow!("no accounts configured"));
    }
    let (min_s, max_s) = config.resolve_poll_interval_secs();
    info!(
        "🚀 monitoring {} account(s), polling every {}-{}s",
        config.accounts.len(),
        min_s,
        max_s
    );
    loop {
        let results = run_monitor_pass(config, ctx).await?;
        let handled: usize = results.iter().map(|(_, s)| s.success + s.skipped).sum();
        info!("✅ pass complete: {} account(s) cycled, {} mention(s) handled", results.len(), handled);

        ctx.pause.check_for_pause().await;
        let secs = rand::rng().random_range(min_s..=max_s);
        info!("💤 sleeping {}s", secs);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Log in as `account` and comment once on `target`'s latest post.
pub async fn run_test_task(
    config: &BotConfig,
    ctx: &RunContext,
    account: &str,
    target: &str,
) -> Result<InteractionResult> {
    let account = lookup_account(config, account)?;
    let (surface, mut orchestrator) = ctx.open(config, account).await?;
    let result = match orchestrator.initialize().await {
        Ok(()) => Ok(orchestrator.comment_on_target(target).await),
        Err(e) => Err(anyhow::Error::new(e)),
    };
    close_quietly(&surface, orchestrator.handle()).await;
    result
}

/// Log in as `account`, then hold the browser open until `confirm` resolves.
pub async fn run_interactive_check<F>(
    config: &BotConfig,
    ctx: &RunContext,
    account: &str,
    confirm: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let account = lookup_account(config, account)?;
    let (surface, mut orchestrator) = ctx.open(config, account).await?;
    if let Err(e) = orchestrator.initialize().await {
        close_quietly(&surface, orchestrator.handle()).await;
        return Err(e.into());
    }
    info!("🔎 {} is logged in; inspect the browser, then confirm to close", orchestrator.handle());
    confirm.await;
    close_quietly(&surface, orchestrator.handle()).await;
    Ok(())
}
