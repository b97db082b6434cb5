use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use mention_responder::core::config::{load_bot_config, load_bot_config_from, BotConfig};
use mention_responder::generator::OpenAiContentGenerator;
use mention_responder::human::PauseToken;
use mention_responder::runner::{self, RunContext, RunMode};
use mention_responder::surface::CdpLauncher;

#[derive(Debug)]
struct CliArgs {
    mode: RunMode,
    account: Option<String>,
    target: Option<String>,
    config: Option<PathBuf>,
}

/// Accepts `--flag value` and `--flag=value`.
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut mode = RunMode::Monitor;
    let mut account = None;
    let mut target = None;
    let mut config = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag.as_str() {
            "--mode" => mode = value()?.parse()?,
            "--account" => account = Some(value()?),
            "--target" => target = Some(value()?),
            "--config" => config = Some(PathBuf::from(value()?)),
            "--help" | "-h" => {
                println!("usage: mention-responder [--mode monitor|test|check] [--account NAME] [--target USER] [--config PATH]");
                std::process::exit(0);
            }
            other => return Err(anyhow!("unknown argument '{}'", other)),
        }
    }
    Ok(CliArgs {
        mode,
        account,
        target,
        config,
    })
}

fn resolve_config(path: Option<&PathBuf>) -> anyhow::Result<BotConfig> {
    match path {
        Some(p) => load_bot_config_from(p).ok_or_else(|| anyhow!("could not load config from {}", p.display())),
        None => Ok(load_bot_config()),
    }
}

async fn wait_for_enter() {
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    });
    match read.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("stdin read failed: {}; closing", e),
        Err(e) => warn!("stdin task failed: {}; closing", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = resolve_config(args.config.as_ref())?;
    info!(
        "Starting mention-responder: mode={:?} accounts={} fast={}",
        args.mode,
        config.accounts.len(),
        config.resolve_fast_mode()
    );

    let generator = OpenAiContentGenerator::from_config(&config.generator)
        .context("failed to set up content generator")?;
    let ctx = RunContext {
        launcher: Arc::new(CdpLauncher::from_config(&config)),
        generator: Arc::new(generator),
        pause: PauseToken::new(),
    };

    match args.mode {
        RunMode::Monitor => {
            #[cfg(feature = "hotkeys")]
            let _hotkeys = mention_responder::human::pause::PauseHotkeys::spawn(ctx.pause.clone());
            tokio::select! {
                res = runner::run_monitor(&config, &ctx) => res,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted; shutting down");
                    Ok(())
                }
            }
        }
        RunMode::Test => {
            let account = args.account.ok_or_else(|| anyhow!("--mode test needs --account"))?;
            let target = args.target.ok_or_else(|| anyhow!("--mode test needs --target"))?;
            #[cfg(feature = "hotkeys")]
            let _hotkeys = mention_responder::human::pause::PauseHotkeys::spawn(ctx.pause.clone());
            let result = runner::run_test_task(&config, &ctx, &account, &target).await?;
            info!("Test task finished: {}", result);
            Ok(())
        }
        RunMode::Check => {
            let account = args.account.ok_or_else(|| anyhow!("--mode check needs --account"))?;
            println!("Press Enter to close the browser once you are done checking.");
            runner::run_interactive_check(&config, &ctx, &account, wait_for_enter()).await
        }
    }
}
