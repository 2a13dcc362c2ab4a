use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::modules::conversion::model::CallbackPayload;

/// Delivers per-quality outcomes. Implementations swallow their own
/// failures: a lost callback never changes the job.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, payload: &CallbackPayload);
}

pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) {
        info!(
            url,
            media_id = payload.media_id,
            quality = %payload.quality,
            status = ?payload.status,
            "Sending callback"
        );

        match self.client.post(url).json(payload).send().await {
            Ok(resp) => info!(url, status = %resp.status(), "Callback delivered"),
            Err(e) => error!(url, "Callback failed: {}", e),
        }
    }
}
