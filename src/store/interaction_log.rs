//! Append-only CSV log of every comment and reply sent, across all accounts.
//!
//! Columns: `timestamp,account,target,action,text`. The `text` column is
//! always quoted; other columns are quoted only when they need it.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "timestamp,account,target,action,text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionAction {
    Comment,
    Reply,
}

impl InteractionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Reply => "reply",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    pub target: String,
    pub action: InteractionAction,
    pub text: String,
}

impl InteractionRecord {
    pub fn now(
        account: impl Into<String>,
        target: impl Into<String>,
        action: InteractionAction,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            account: account.into(),
            target: target.into(),
            action,
            text: text.into(),
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            csv_field(&self.account),
            csv_field(&self.target),
            self.action.as_str(),
            quote(&self.text)
        )
    }
}

#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first when the file is new or empty.
    pub fn append(&self, record: &InteractionRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_header {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        writeln!(file, "{}", record.to_csv_row())
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        quote(s)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(text: &str) -> InteractionRecord {
        InteractionRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            account: "bot".into(),
            target: "https://example.com/p/AbC/".into(),
            action: InteractionAction::Reply,
            text: text.into(),
        }
    }

    #[test]
    fn test_text_is_always_quoted() {
        assert_eq!(
            record("thanks!").to_csv_row(),
            "2026-03-01T12:30:00Z,bot,https://example.com/p/AbC/,reply,\"thanks!\""
        );
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let row = record("she said \"wow\", really").to_csv_row();
        assert!(row.ends_with(",\"she said \"\"wow\"\", really\""));
    }

    #[test]
    fn test_other_fields_quoted_only_when_needed() {
        let mut r = record("x");
        r.account = "a,b".into();
        assert!(r.to_csv_row().contains(",\"a,b\","));
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("interactions.csv"));
        log.append(&record("one")).unwrap();
        log.append(&record("two")).unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].ends_with("\"two\""));
    }
}
