//! Session cookie persistence: one JSON cookie array per account.
//!
//! After a successful login the browser cookies are written to
//! `{data_dir}/accounts/{handle}/session.json`. The next session injects them
//! before the first navigation so the account comes up already authenticated.

use std::path::Path;
use tracing::{info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Expiry helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum finite cookie expiry timestamp from a raw cookie array.
///
/// CDP cookies carry an `expires` field that is either `-1.0` (session
/// cookie) or a positive Unix timestamp in seconds. Returns `None` when every
/// cookie is session-scoped.
pub fn min_cookie_expiry(raw_cookies: &[serde_json::Value]) -> Option<f64> {
    raw_cookies
        .iter()
        .filter_map(|v| v.get("expires").and_then(|e| e.as_f64()))
        .filter(|&exp| exp > 0.0)
        .reduce(f64::min)
}

/// Drop cookies whose persistent expiry is already in the past.
pub fn retain_live(raw_cookies: Vec<serde_json::Value>, now_unix: f64) -> Vec<serde_json::Value> {
    raw_cookies
        .into_iter()
        .filter(|v| match v.get("expires").and_then(|e| e.as_f64()) {
            Some(exp) if exp > 0.0 => exp > now_unix,
            _ => true,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Load stored cookies, minus the expired ones.
///
/// Returns `None` when the file is missing, unreadable, or holds no live cookie.
pub fn load_raw(path: &Path) -> Option<Vec<serde_json::Value>> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("session_store: failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    let cookies: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("session_store: failed to parse {}: {}", path.display(), e);
            return None;
        }
    };
    let total = cookies.len();
    let cookies = retain_live(cookies, chrono::Utc::now().timestamp() as f64);
    if cookies.is_empty() {
        return None;
    }
    info!(
        "session_store: 🍪 loaded {}/{} live cookies ({})",
        cookies.len(),
        total,
        path.display()
    );
    Some(cookies)
}

/// Persist cookies through the shared atomic JSON writer.
pub fn save_raw(path: &Path, raw_cookies: &[serde_json::Value]) -> std::io::Result<()> {
    crate::store::write_json_atomic(path, raw_cookies)?;
    info!(
        "session_store: saved {} cookies ({}), earliest expiry {:?}",
        raw_cookies.len(),
        path.display(),
        min_cookie_expiry(raw_cookies)
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Inject
// ─────────────────────────────────────────────────────────────────────────────

/// Inject stored cookies into a live CDP page **before** navigation.
///
/// Any cookie that fails to deserialise into a `CookieParam` is skipped so a
/// partially-malformed file never blocks a session. Returns `true` when at
/// least one cookie was set.
pub async fn inject_into_page(page: &chromiumoxide::Page, raw_cookies: &[serde_json::Value]) -> bool {
    use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};

    let cookie_params: Vec<CookieParam> = raw_cookies
        .iter()
        .filter_map(|v| serde_json::from_value::<CookieParam>(v.clone()).ok())
        .collect();

    if cookie_params.is_empty() {
        warn!("session_store: stored session contained no valid CookieParams; skipping injection");
        return false;
    }

    let count = cookie_params.len();
    match page.execute(SetCookiesParams::new(cookie_params)).await {
        Ok(_) => {
            info!("session_store: 💉 injected {} session cookies", count);
            true
        }
        Err(e) => {
            warn!("session_store: failed to inject session cookies: {}", e);
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_min_expiry_ignores_session_cookies() {
        let cookies = vec![
            json!({"name": "sessionid", "value": "a", "expires": -1.0}),
            json!({"name": "csrftoken", "value": "b", "expires": 1_900_000_000.0}),
            json!({"name": "ds_user", "value": "c", "expires": 1_800_000_000.0}),
        ];
        assert_eq!(min_cookie_expiry(&cookies), Some(1_800_000_000.0));
        assert!(min_cookie_expiry(&cookies[..1]).is_none());
    }

    #[test]
    fn test_retain_live_drops_expired() {
        let cookies = vec![
            json!({"name": "old", "value": "x", "expires": 100.0}),
            json!({"name": "session", "value": "y", "expires": -1.0}),
            json!({"name": "fresh", "value": "z", "expires": 5000.0}),
        ];
        let live = retain_live(cookies, 1000.0);
        let names: Vec<&str> = live.iter().filter_map(|c| c["name"].as_str()).collect();
        assert_eq!(names, vec!["session", "fresh"]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acct").join("session.json");
        let cookies = vec![json!({"name": "sessionid", "value": "abc", "expires": -1.0})];
        save_raw(&path, &cookies).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_raw(&path), Some(cookies));
    }

    #[test]
    fn test_load_missing_or_all_expired() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_raw(&dir.path().join("none.json")).is_none());

        let path = dir.path().join("expired.json");
        save_raw(&path, &[json!({"name": "old", "value": "x", "expires": 1.0})]).unwrap();
        assert!(load_raw(&path).is_none());
    }
}
