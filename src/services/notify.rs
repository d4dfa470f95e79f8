//! Deploy notifications
//!
//! Posts status messages to a Slack channel over an incoming webhook.
//! Delivery is strictly best-effort: the first failure of any kind
//! disables the notifier for the rest of the process, because within one
//! short-lived deploy run repeat attempts are unlikely to fare better
//! and timeouts get tedious fast.

use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::infra::secrets::SecretStore;

const WEBHOOK_SECRET: &str = "slack/deploy-webhook";
const USERNAME: &str = "montagu-bot";
const ICON_EMOJI: &str = ":robot_face:";

pub struct Notifier {
    enabled: bool,
    url: String,
    channel: String,
    client: Client,
}

impl Notifier {
    /// Build a notifier for the given channel; `None` or an empty channel
    /// name yields a permanently disabled notifier.
    ///
    /// A webhook secret that cannot be fetched also disables it: a deploy
    /// must never fail because the chat integration is broken.
    pub async fn new(secrets: &dyn SecretStore, channel: Option<&str>) -> Self {
        let channel = match channel {
            Some(c) if !c.is_empty() => c,
            _ => return Self::disabled(),
        };
        match secrets.get_secret(WEBHOOK_SECRET).await {
            Ok(path) => Self::with_webhook(
                &format!("https://hooks.slack.com/services/{}", path),
                channel,
            ),
            Err(e) => {
                warn!(error = %e, "could not fetch webhook secret, notifications disabled");
                Self::disabled()
            }
        }
    }

    pub fn with_webhook(url: &str, channel: &str) -> Self {
        Self {
            enabled: true,
            url: url.to_string(),
            channel: format!("#{}", channel),
            client: http_client(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            channel: String::new(),
            client: http_client(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Post a message; a no-op when disabled.
    ///
    /// Never returns an error: an HTTP status of 300 or above, or any
    /// transport failure, logs a warning and flips the notifier to
    /// disabled for the remainder of the process.
    pub async fn post(&mut self, message: &str) {
        if !self.enabled {
            return;
        }
        let payload = serde_json::json!({
            "text": message,
            "channel": self.channel,
            "username": USERNAME,
            "icon_emoji": ICON_EMOJI,
        });
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().as_u16() < 300 => {}
            Ok(response) => {
                warn!(
                    status = %response.status(),
                    "problem sending notification, disabling notifier"
                );
                self.enabled = false;
            }
            Err(e) => {
                warn!(error = %e, "problem sending notification, disabling notifier");
                self.enabled = false;
            }
        }
    }
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::secrets::testing::FakeSecrets;

    #[tokio::test]
    async fn test_missing_channel_disables() {
        let secrets = FakeSecrets::new();
        assert!(!Notifier::new(&secrets, None).await.is_enabled());
        assert!(!Notifier::new(&secrets, Some("")).await.is_enabled());
    }

    #[tokio::test]
    async fn test_missing_webhook_secret_disables() {
        let secrets = FakeSecrets::new();
        let notifier = Notifier::new(&secrets, Some("montagu-deploys")).await;
        assert!(!notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_configured_notifier_is_enabled() {
        let mut secrets = FakeSecrets::new();
        secrets.insert("slack/deploy-webhook", "T000/B000/XXXX");
        let notifier = Notifier::new(&secrets, Some("montagu-deploys")).await;
        assert!(notifier.is_enabled());
        assert_eq!(notifier.channel, "#montagu-deploys");
        assert_eq!(notifier.url, "https://hooks.slack.com/services/T000/B000/XXXX");
    }

    #[tokio::test]
    async fn test_disabled_post_is_a_noop() {
        let mut notifier = Notifier::disabled();
        // would panic on an empty URL if a request were attempted
        notifier.post("deploy finished").await;
        assert!(!notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_transport_failure_disables_permanently() {
        // nothing listens on this port; the connection is refused at once
        let mut notifier = Notifier::with_webhook("http://127.0.0.1:9/hook", "deploys");
        assert!(notifier.is_enabled());

        notifier.post("first message").await;
        assert!(!notifier.is_enabled());

        // subsequent posts are no-ops and attempt no network call
        notifier.post("second message").await;
        assert!(!notifier.is_enabled());
    }
}
