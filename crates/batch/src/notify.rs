use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::types::BatchStatusReport;
use crate::BatchError;

/// Told once when a batch reaches a terminal status.
///
/// Delivery is best effort: the coordinator logs failures and never retries.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, url: &str, report: &BatchStatusReport) -> Result<(), BatchError>;
}

/// Posts the final [`BatchStatusReport`] as JSON to the submitter's URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, BatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("territoires/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, url: &str, report: &BatchStatusReport) -> Result<(), BatchError> {
        let response = self.client.post(url).json(report).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BatchError::Webhook(format!("endpoint answered {status}")));
        }
        debug!(batch_id = %report.request.id, url, "webhook delivered");
        Ok(())
    }
}

/// Reject anything that is not an absolute http(s) URL.
pub(crate) fn check_webhook_url(url: &str) -> Result<(), BatchError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| BatchError::InvalidWebhook(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(BatchError::InvalidWebhook(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}
