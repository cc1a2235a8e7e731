//! Push notifications for background job failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook answered {status}")]
    Rejected { status: u16 },
}

/// `[notify]` section. Notifications are off unless a webhook URL is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    10
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
}

/// Posts `{"title", "body"}` as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build a notifier from config, or `None` when no webhook is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, NotifyError> {
        match config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(Some(Self::new(
                url,
                Duration::from_secs(config.timeout_secs as u64),
            )?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        debug!(title = %title, "Sending webhook notification");
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { title, body })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_webhook_means_no_notifier() {
        let config = NotifyConfig::default();
        assert!(WebhookNotifier::from_config(&config).unwrap().is_none());

        let config = NotifyConfig {
            webhook_url: Some(String::new()),
            timeout_secs: 5,
        };
        assert!(WebhookNotifier::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(WebhookPayload {
            title: "Sweep failed",
            body: "daemon unreachable",
        })
        .unwrap();
        assert_eq!(json["title"], "Sweep failed");
        assert_eq!(json["body"], "daemon unreachable");
    }
}
