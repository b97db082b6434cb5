use crate::core::types::ActionDelayWindow;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// BotConfig: file-based config loader (mention-responder.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "MENTION_RESPONDER_CONFIG";
pub const ENV_FAST_MODE: &str = "MENTION_RESPONDER_FAST";
pub const ENV_DATA_DIR: &str = "MENTION_RESPONDER_DATA_DIR";
pub const ENV_HEADLESS: &str = "MENTION_RESPONDER_HEADLESS";
pub const ENV_MODEL: &str = "MENTION_RESPONDER_MODEL";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

const DEFAULT_BASE_URL: &str = "https://www.instagram.com";

/// Content-generator sub-config (mirrors the `generator` key).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct GeneratorConfig {
    /// OpenAI-compatible endpoint, e.g. `https://api.openai.com/v1` or `http://localhost:11434/v1`.
    pub base_url: Option<String>,
    /// API key. Never logged. An explicit `""` means the endpoint needs no key.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl GeneratorConfig {
    /// API key: JSON field → `OPENAI_API_KEY` env var → `None`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(k) = &self.api_key {
            return Some(k.trim().to_string());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Endpoint: JSON field → `OPENAI_BASE_URL` env var → `https://api.openai.com/v1`.
    pub fn resolve_base_url(&self) -> String {
        if let Some(u) = &self.base_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Model: JSON field → `MENTION_RESPONDER_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_model(&self) -> String {
        if let Some(m) = &self.model {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        std::env::var(ENV_MODEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn resolve_temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.8).clamp(0.0, 2.0)
    }
}

/// One bot account. Credentials are read from the config file only.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct AccountConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub min_action_delay_ms: Option<u64>,
    pub max_action_delay_ms: Option<u64>,
    /// Extra steering passed to the content generator.
    pub prompt_hint: Option<String>,
}

impl AccountConfig {
    /// Handle with any leading `@` removed, lowercased for comparisons.
    pub fn handle(&self) -> String {
        normalize_handle(&self.username)
    }

    /// Per-account action pacing, or the fast fixed window when `fast` is set.
    pub fn action_delay_window(&self, fast: bool) -> ActionDelayWindow {
        if fast {
            return ActionDelayWindow::fast();
        }
        let d = ActionDelayWindow::default();
        ActionDelayWindow::new(
            self.min_action_delay_ms.unwrap_or(d.min_ms),
            self.max_action_delay_ms.unwrap_or(d.max_ms),
        )
    }
}

/// Strip a leading `@`, trim, lowercase.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

/// Top-level config loaded from `mention-responder.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BotConfig {
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    /// Fast timing profile: fixed short waits, bulk fill, forced clicks.
    pub fast_mode: Option<bool>,
    pub headless: Option<bool>,
    pub poll_interval_min_secs: Option<u64>,
    pub poll_interval_max_secs: Option<u64>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl BotConfig {
    /// Site root without a trailing slash.
    pub fn resolve_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Data directory: JSON field → `MENTION_RESPONDER_DATA_DIR` → `~/.mention-responder`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(d) = &self.data_dir {
            return d.clone();
        }
        if let Ok(v) = std::env::var(ENV_DATA_DIR) {
            if !v.trim().is_empty() {
                return PathBuf::from(v.trim());
            }
        }
        dirs::home_dir()
            .map(|h| h.join(".mention-responder"))
            .unwrap_or_else(|| PathBuf::from(".mention-responder"))
    }

    /// Fast mode: JSON field → `MENTION_RESPONDER_FAST` env var → `false`.
    pub fn resolve_fast_mode(&self) -> bool {
        if let Some(b) = self.fast_mode {
            return b;
        }
        env_flag(ENV_FAST_MODE).unwrap_or(false)
    }

    /// Headless: JSON field → `MENTION_RESPONDER_HEADLESS` env var → `false`
    /// (a visible window is the normal operating mode).
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        env_flag(ENV_HEADLESS).unwrap_or(false)
    }

    /// Randomized sleep bounds between monitor cycles, in seconds.
    pub fn resolve_poll_interval_secs(&self) -> (u64, u64) {
        let min = self.poll_interval_min_secs.unwrap_or(300);
        let max = self.poll_interval_max_secs.unwrap_or(600);
        if min > max {
            (max, min)
        } else {
            (min, max)
        }
    }

    pub fn account(&self, username: &str) -> Option<&AccountConfig> {
        let wanted = normalize_handle(username);
        self.accounts.iter().find(|a| a.handle() == wanted)
    }

    /// `{data_dir}/accounts/{handle}`
    pub fn account_dir(&self, account: &AccountConfig) -> PathBuf {
        self.resolve_data_dir().join("accounts").join(account.handle())
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.resolve_data_dir().join("screenshots")
    }

    pub fn interaction_log_path(&self) -> PathBuf {
        self.resolve_data_dir().join("interactions.csv")
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return None;
    }
    Some(matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

/// Load `mention-responder.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `MENTION_RESPONDER_CONFIG` env var path
/// 2. `./mention-responder.json`
/// 3. `../mention-responder.json`
///
/// Missing file → `BotConfig::default()`.
/// Parse error → log a warning, return `BotConfig::default()`.
pub fn load_bot_config() -> BotConfig {
    let mut candidates = vec![
        PathBuf::from("mention-responder.json"),
        PathBuf::from("../mention-responder.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        if let Some(cfg) = load_bot_config_from(path) {
            return cfg;
        }
    }
    BotConfig::default()
}

/// Parse a config file. `None` when the file does not exist; a parse error
/// logs a warning and yields the defaults.
pub fn load_bot_config_from(path: &Path) -> Option<BotConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<BotConfig>(&contents) {
        Ok(cfg) => {
            tracing::info!(
                "mention-responder.json loaded from {} ({} account(s))",
                path.display(),
                cfg.accounts.len()
            );
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(
                "mention-responder.json parse error at {}: {}; using defaults",
                path.display(),
                e
            );
            Some(BotConfig::default())
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}
