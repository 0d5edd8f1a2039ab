//! Configuration and constants

use crate::error::{Error, Result};
use chrono::FixedOffset;
use std::path::{Path, PathBuf};

/// Phrase that opts the sender in, matched anywhere in the message
pub const TRIGGER_PHRASE: &str = "remind streak";

/// Reply sent the first time a sender opts in
pub const ACTIVATED_REPLY: &str =
    "Streak reminder just activated! You'll get a nudge every day at 8:00 PM.";

/// Reply sent when the sender is already registered
pub const ALREADY_SIGNED_UP_REPLY: &str =
    "You're already signed up for the daily streak reminder.";

/// Text pushed to every registered recipient by the daily job
pub const REMINDER_TEXT: &str = "Hello! 👋 Don't lose your streak - this is your daily 8PM reminder.";

/// Daily trigger time (Asia/Manila, which has no DST)
pub const SCHEDULE_HOUR: u32 = 20;
pub const SCHEDULE_MINUTE: u32 = 0;
pub const SCHEDULE_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v18.0/me/messages";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub verify_token: String,
    pub page_access_token: String,
    pub bind: String,
    pub registry_file: PathBuf,
    pub graph_api_url: String,
    pub owner_recipient_id: Option<String>,
    pub schedule_hour: u32,
    pub schedule_minute: u32,
    pub schedule_offset: FixedOffset,
}

impl Config {
    /// Build config from the process environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        Ok(Self {
            verify_token: required("VERIFY_TOKEN")?,
            page_access_token: required("PAGE_ACCESS_TOKEN")?,
            bind: lookup("BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            registry_file: lookup("REGISTRY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_registry_file),
            graph_api_url: lookup("GRAPH_API_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_URL.to_string()),
            owner_recipient_id: lookup("OWNER_RECIPIENT_ID").filter(|v| !v.is_empty()),
            schedule_hour: SCHEDULE_HOUR,
            schedule_minute: SCHEDULE_MINUTE,
            schedule_offset: schedule_offset(),
        })
    }

    /// Create config for testing with custom paths
    pub fn for_test(temp_dir: &Path) -> Self {
        Self {
            verify_token: "test-verify-token".to_string(),
            page_access_token: "test-page-token".to_string(),
            bind: "127.0.0.1:0".to_string(),
            registry_file: temp_dir.join("state/recipients.json"),
            graph_api_url: "http://127.0.0.1:9/me/messages".to_string(),
            owner_recipient_id: None,
            schedule_hour: SCHEDULE_HOUR,
            schedule_minute: SCHEDULE_MINUTE,
            schedule_offset: schedule_offset(),
        }
    }
}

fn schedule_offset() -> FixedOffset {
    FixedOffset::east_opt(SCHEDULE_UTC_OFFSET_SECS).expect("Invalid schedule UTC offset")
}

fn default_registry_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("streak-reminder"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recipients.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", "secret"),
            ("PAGE_ACCESS_TOKEN", "page"),
        ]))
        .unwrap();

        assert_eq!(config.verify_token, "secret");
        assert_eq!(config.page_access_token, "page");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.graph_api_url, DEFAULT_GRAPH_API_URL);
        assert!(config.registry_file.ends_with("recipients.json"));
        assert!(config.owner_recipient_id.is_none());
        assert_eq!(config.schedule_hour, 20);
        assert_eq!(config.schedule_minute, 0);
        assert_eq!(config.schedule_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", "secret"),
            ("PAGE_ACCESS_TOKEN", "page"),
            ("BIND", "127.0.0.1:3000"),
            ("REGISTRY_FILE", "/tmp/r.json"),
            ("OWNER_RECIPIENT_ID", "12345"),
        ]))
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.registry_file, PathBuf::from("/tmp/r.json"));
        assert_eq!(config.owner_recipient_id.as_deref(), Some("12345"));
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[("VERIFY_TOKEN", "secret")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("PAGE_ACCESS_TOKEN")));

        let err = Config::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", ""),
            ("PAGE_ACCESS_TOKEN", "page"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_trigger_phrase_is_lowercase() {
        assert_eq!(TRIGGER_PHRASE, TRIGGER_PHRASE.to_lowercase());
    }
}
