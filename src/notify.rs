//! Notification sinks
//!
//! The manager calls a [`Notifier`] once per finished collection and does not wait for
//! it. Delivery channel selection and retries belong to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::types::{Subscription, WebhookPayload};

/// Kind of notification being sent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A collection was organized into its final location
    DownloadFinished,
}

impl NotificationKind {
    /// Event name used in payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DownloadFinished => "download_finished",
        }
    }
}

/// Destination for user-facing notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` about `subscription`
    async fn notify(
        &self,
        subscription: &Subscription,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()>;
}

/// Notifier that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _: &Subscription, _: &str, _: NotificationKind) -> Result<()> {
        Ok(())
    }
}

/// Posts a JSON [`WebhookPayload`] to every configured webhook
///
/// Webhooks are tried in order; a failing webhook is logged and does not stop the
/// rest. The call errors only when every webhook failed.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhooks: Vec<WebhookConfig>,
}

impl WebhookNotifier {
    /// Create a notifier for `webhooks`
    pub fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhooks,
        }
    }

    async fn post(&self, webhook: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
        let mut request = self
            .client
            .post(&webhook.url)
            .json(payload)
            .timeout(webhook.timeout);
        if let Some(auth) = &webhook.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = tokio::time::timeout(webhook.timeout, request.send())
            .await
            .map_err(|_| Error::Other(format!("webhook timed out after {:?}", webhook.timeout)))??;

        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "webhook returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        subscription: &Subscription,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        if self.webhooks.is_empty() {
            return Ok(());
        }

        let payload = WebhookPayload {
            event: kind.as_str().to_string(),
            title: subscription.title.clone(),
            subgroup: subscription.subgroup.clone(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let mut failures = 0;
        for webhook in &self.webhooks {
            match self.post(webhook, &payload).await {
                Ok(()) => tracing::debug!(url = %webhook.url, "webhook sent successfully"),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(url = %webhook.url, error = %e, "webhook failed");
                }
            }
        }

        if failures == self.webhooks.len() {
            return Err(Error::Other(format!("all {failures} webhooks failed")));
        }
        Ok(())
    }
}

/// Build the notifier described by the configuration
pub(crate) fn from_config(webhooks: &[WebhookConfig]) -> Arc<dyn Notifier> {
    if webhooks.is_empty() {
        Arc::new(NoopNotifier)
    } else {
        Arc::new(WebhookNotifier::new(webhooks.to_vec()))
    }
}
