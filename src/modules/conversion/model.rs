use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dto::ConvertRequest;

/// One accepted conversion request, alive from enqueue until the worker is
/// done with it.
#[derive(Debug)]
pub struct ConversionJob {
    pub id: String,
    pub request: ConvertRequest,
    cancel: CancellationToken,
    // Only the worker touches this today; the lock keeps it safe for a
    // future status reader.
    completed: Mutex<Vec<String>>,
}

impl ConversionJob {
    pub fn new(request: ConvertRequest) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), request)
    }

    pub fn with_id(id: String, request: ConvertRequest) -> Self {
        Self {
            id,
            request,
            cancel: CancellationToken::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token shared by every blocking step of this job.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Records a finished quality and returns the completed set, in
    /// completion order.
    pub fn mark_completed(&self, quality: &str) -> Vec<String> {
        let mut completed = self.lock_completed();
        completed.push(quality.to_string());
        completed.clone()
    }

    pub fn completed_qualities(&self) -> Vec<String> {
        self.lock_completed().clone()
    }

    fn lock_completed(&self) -> MutexGuard<'_, Vec<String>> {
        // The list is append-only, so a poisoned guard still holds valid data.
        self.completed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Completed,
    Failed,
}

/// Outcome of one quality, posted to the caller's callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub media_id: i64,
    pub quality: String,
    pub status: CallbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CallbackPayload {
    pub fn completed(media_id: i64, quality: &str, s3_path: String) -> Self {
        Self {
            media_id,
            quality: quality.to_string(),
            status: CallbackStatus::Completed,
            s3_path: Some(s3_path),
            error_message: None,
        }
    }

    pub fn failed(media_id: i64, quality: &str, error_message: impl Into<String>) -> Self {
        Self {
            media_id,
            quality: quality.to_string(),
            status: CallbackStatus::Failed,
            s3_path: None,
            error_message: Some(error_message.into()),
        }
    }
}
