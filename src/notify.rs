use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Outbound progress messages (run started, per-account outcomes, run
/// finished). Strictly best-effort: a failed delivery never fails the run,
/// so implementations swallow their own errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &str, text: &str);
}

/// Default sink: structured log lines.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, owner: &str, text: &str) {
        info!(owner, "{text}");
    }
}

/// POSTs `{ "owner": ..., "text": ... }` to a webhook with a short timeout.
pub struct WebhookNotifier {
    url: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> WebhookNotifier {
        WebhookNotifier {
            url: url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, owner: &str, text: &str) {
        let body = json!({ "owner": owner, "text": text });
        if let Err(e) = self.http.post(&self.url).json(&body).send().await {
            warn!(owner, error = %e, "notification delivery failed");
        }
    }
}
