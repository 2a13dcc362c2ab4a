use super::dto::{ConvertRequest, ConvertResponse};
use super::model::ConversionJob;
use crate::state::AppState;
use anyhow::Result;
use tracing::info;

pub struct ConversionService;

impl ConversionService {
    /// Queues a validated request. Waits while the queue is full.
    /// A blank callback URL is replaced by the configured one.
    pub async fn submit(state: AppState, mut req: ConvertRequest) -> Result<ConvertResponse> {
        if req.callback_url.trim().is_empty() {
            req.callback_url = state.config.callback_url.clone();
        }
        if let Some(title) = req.title.as_deref() {
            info!(media_file_id = req.media_file_id, title, "Conversion requested");
        }

        let job = state.queue.enqueue(ConversionJob::new(req)).await?;

        info!(
            job_id = %job.id,
            media_file_id = job.request.media_file_id,
            "Conversion created"
        );

        Ok(ConvertResponse {
            conversion_id: job.id.clone(),
            message: "Conversion started".to_string(),
        })
    }

    pub fn cancel(state: &AppState, conversion_id: &str) -> bool {
        state.queue.cancel(conversion_id)
    }
}
