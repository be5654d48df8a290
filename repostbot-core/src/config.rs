//! Strongly-typed bot configuration.
//!
//! The TOML file is deserialized into a permissive raw form first, then
//! validated in one pass so a broken config reports every problem at once
//! instead of failing on the first missing key. Validated snapshots are
//! immutable; reloads happen only between cycles and produce a new
//! snapshot.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    pub target_group_id: i64,
    pub region_id: i64,
    pub search_keywords: Vec<String>,
    pub post_keywords: Vec<String>,
    pub blacklist_groups: Vec<i64>,
    pub stop_words: Vec<String>,
    pub spam_regex: Vec<String>,
    pub max_groups: u32,
    pub days_ago: u32,
    pub check_interval_seconds: u64,
    pub use_proxy: bool,
    pub proxy_url: Option<String>,
    pub notify_token: Option<String>,
    pub notify_chat_id: Option<String>,
    pub process_comments: bool,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
        let raw: RawConfig = toml::from_str(&contents)?;
        raw.validate()
    }

    /// Notifications are enabled only when both token and chat id are set.
    pub fn notifications_enabled(&self) -> bool {
        self.notify_token.is_some() && self.notify_chat_id.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    access_token: Option<String>,
    target_group_id: Option<i64>,
    region_id: Option<i64>,
    search_keywords: Option<Vec<String>>,
    post_keywords: Option<Vec<String>>,
    blacklist_groups: Option<Vec<i64>>,
    stop_words: Option<Vec<String>>,
    spam_regex: Option<Vec<String>>,
    max_groups: Option<u32>,
    days_ago: Option<u32>,
    check_interval_seconds: Option<u64>,
    use_proxy: Option<bool>,
    proxy_url: Option<String>,
    notify_token: Option<String>,
    notify_chat_id: Option<String>,
    process_comments: Option<bool>,
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let mut problems = Vec::new();

        let access_token = match self.access_token {
            Some(t) if !t.is_empty() => t,
            _ => {
                problems.push("access_token is missing or empty".to_string());
                String::new()
            }
        };

        let target_group_id = match self.target_group_id {
            Some(id) if id != 0 => id,
            Some(_) => {
                problems.push("target_group_id must be non-zero".to_string());
                0
            }
            None => {
                problems.push("target_group_id is missing".to_string());
                0
            }
        };

        let region_id = match self.region_id {
            Some(id) if id != 0 => id,
            Some(_) => {
                problems.push("region_id must be non-zero".to_string());
                0
            }
            None => {
                problems.push("region_id is missing".to_string());
                0
            }
        };

        let search_keywords = self.search_keywords.unwrap_or_default();
        if search_keywords.is_empty() {
            problems.push("search_keywords must list at least one keyword".to_string());
        }

        let post_keywords = self.post_keywords.unwrap_or_default();
        if post_keywords.is_empty() {
            problems.push("post_keywords must list at least one keyword".to_string());
        }

        let max_groups = self.max_groups.unwrap_or(0);
        if !(1..=1000).contains(&max_groups) {
            problems.push(format!(
                "max_groups must be between 1 and 1000, got {}",
                max_groups
            ));
        }

        let days_ago = self.days_ago.unwrap_or(0);
        if days_ago == 0 {
            problems.push("days_ago must be at least 1".to_string());
        }

        let check_interval_seconds = self.check_interval_seconds.unwrap_or(0);
        if check_interval_seconds == 0 {
            problems.push("check_interval_seconds must be at least 1".to_string());
        }

        let use_proxy = self.use_proxy.unwrap_or(false);
        let proxy_url = self.proxy_url.filter(|u| !u.is_empty());
        if use_proxy && proxy_url.is_none() {
            problems.push("use_proxy is set but proxy_url is missing".to_string());
        }

        if !problems.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: problems.join("; "),
            });
        }

        Ok(Config {
            access_token,
            target_group_id,
            region_id,
            search_keywords,
            post_keywords,
            blacklist_groups: self.blacklist_groups.unwrap_or_default(),
            stop_words: self.stop_words.unwrap_or_default(),
            spam_regex: self.spam_regex.unwrap_or_default(),
            max_groups,
            days_ago,
            check_interval_seconds,
            use_proxy,
            proxy_url,
            notify_token: self.notify_token.filter(|t| !t.is_empty()),
            notify_chat_id: self.notify_chat_id.filter(|c| !c.is_empty()),
            process_comments: self.process_comments.unwrap_or(false),
        })
    }
}

/// Tracks the config file on disk and hands out fresh snapshots when it
/// changes. Callers decide when to look, which keeps reloads confined to
/// cycle boundaries.
#[derive(Debug)]
pub struct ConfigSource {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigSource {
    /// Loads and validates the initial snapshot. A broken config here is
    /// fatal: the loop must not start without a valid one.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, Config), ConfigError> {
        let path = path.into();
        let config = Config::from_file(&path)?;
        let last_modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok((
            Self {
                path,
                last_modified,
            },
            config,
        ))
    }

    /// Returns a new snapshot if the file changed since the last load.
    /// A reload that fails validation keeps the previous snapshot in use.
    pub fn reload_if_changed(&mut self) -> Option<Config> {
        let modified = std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        if Some(modified) == self.last_modified {
            return None;
        }
        self.last_modified = Some(modified);
        match Config::from_file(&self.path) {
            Ok(config) => {
                info!("Configuration reloaded from {}", self.path.display());
                Some(config)
            }
            Err(e) => {
                warn!(
                    "Ignoring config reload, keeping previous snapshot: {}",
                    e
                );
                None
            }
        }
    }
}
