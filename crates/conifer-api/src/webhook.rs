//! Change-notification webhook delivery.
//!
//! Fired after a configuration commit when the committed document names a
//! receiver URL. Delivery is best-effort with a bounded deadline; a failed
//! delivery surfaces as a degraded-success warning on the commit, never as
//! an error.

use std::time::Duration;

use async_trait::async_trait;

use conifer_core::{AdminEventPayload, ChangeNotifier, Error, Result};

/// Default delivery deadline.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts configuration-change notifications to a receiver URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier").finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    /// Creates a notifier with the given delivery deadline.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_WEBHOOK_TIMEOUT)
    }
}

#[async_trait]
impl ChangeNotifier for WebhookNotifier {
    async fn notify(&self, url: &str, user: &str, payload: &AdminEventPayload) -> Result<()> {
        let body = serde_json::json!({
            "user": user,
            "event": payload,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                crate::metrics::record_webhook_failure();
                Error::storage(format!("change webhook request failed: {e}"))
            })?;

        if !response.status().is_success() {
            crate::metrics::record_webhook_failure();
            return Err(Error::storage(format!(
                "change webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
