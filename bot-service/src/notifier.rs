//! Best-effort Telegram reporting. Unconfigured means silently disabled;
//! a delivery failure is logged and never affects the cycle.

use repostbot_core::{clip_chars, Config, CoreError, CycleStats, NotificationError};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

#[derive(Debug)]
pub struct Notifier {
    channel: Option<Channel>,
}

#[derive(Debug)]
struct Channel {
    http_client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl Notifier {
    /// Builds a notifier from the config snapshot. The HTTP client only
    /// exists when both credentials are set, so an unconfigured notifier
    /// carries no state at all.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let channel = match (&config.notify_token, &config.notify_chat_id) {
            (Some(token), Some(chat_id)) => {
                let http_client = Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()?;
                Some(Channel {
                    http_client,
                    api_base: TELEGRAM_API_BASE.to_string(),
                    token: token.clone(),
                    chat_id: chat_id.clone(),
                })
            }
            _ => None,
        };

        Ok(Self { channel })
    }

    pub fn disabled() -> Self {
        Self { channel: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Fire-and-forget delivery. Errors are logged, never returned to the
    /// cycle loop.
    pub async fn send(&self, text: &str) {
        let Some(channel) = &self.channel else {
            debug!("Notifications disabled, dropping message");
            return;
        };

        if let Err(e) = channel.deliver(text).await {
            warn!("Notification delivery failed: {}", e);
        }
    }
}

impl Channel {
    async fn deliver(&self, text: &str) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": clip_chars(text, TELEGRAM_MESSAGE_LIMIT),
        });

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotificationError::BadStatus {
                status_code: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Human-readable per-cycle summary delivered to the channel.
pub fn format_cycle_report(stats: &CycleStats) -> String {
    format!(
        "Cycle finished:\n\
         - posts seen: {}\n\
         - published: {}\n\
         - errors: {}",
        stats.total_posts, stats.published_posts, stats.errors
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_notify(token: Option<&str>, chat_id: Option<&str>) -> Config {
        Config {
            access_token: "token".to_string(),
            target_group_id: -999,
            region_id: 47,
            search_keywords: vec!["news".to_string()],
            post_keywords: vec!["concert".to_string()],
            blacklist_groups: vec![],
            stop_words: vec![],
            spam_regex: vec![],
            max_groups: 10,
            days_ago: 1,
            check_interval_seconds: 600,
            use_proxy: false,
            proxy_url: None,
            notify_token: token.map(String::from),
            notify_chat_id: chat_id.map(String::from),
            process_comments: false,
        }
    }

    #[test]
    fn test_disabled_without_credentials() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
    }

    #[test]
    fn test_from_config_needs_both_credentials() {
        let enabled = Notifier::from_config(&config_with_notify(Some("abc"), Some("42"))).unwrap();
        assert!(enabled.is_enabled());

        let half = Notifier::from_config(&config_with_notify(Some("abc"), None)).unwrap();
        assert!(!half.is_enabled());

        let none = Notifier::from_config(&config_with_notify(None, None)).unwrap();
        assert!(!none.is_enabled());
    }

    #[tokio::test]
    async fn test_send_on_disabled_notifier_is_a_noop() {
        let notifier = Notifier::disabled();
        // Must return without any network activity or panic.
        notifier.send("hello").await;
    }

    #[test]
    fn test_cycle_report_formatting() {
        let stats = CycleStats {
            total_posts: 12,
            published_posts: 4,
            errors: 1,
        };
        let report = format_cycle_report(&stats);
        assert!(report.contains("posts seen: 12"));
        assert!(report.contains("published: 4"));
        assert!(report.contains("errors: 1"));
    }
}
