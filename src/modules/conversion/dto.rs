use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidateUrl, ValidationError};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ConvertRequest {
    #[validate(range(min = 1, message = "media_file_id is required"))]
    pub media_file_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "s3_path is required"))]
    pub s3_path: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[validate(length(min = 1, message = "At least one quality is required"))]
    pub qualities: Vec<String>,
    /// Blank means the service's configured callback URL.
    #[serde(default)]
    #[validate(custom(function = "validate_callback_url"))]
    pub callback_url: String,
    #[serde(default)]
    pub cloudfront_url: Option<String>,
    /// Keyframe interval override; zero or absent uses the default.
    #[serde(default)]
    pub gop_size: Option<u32>,
    #[serde(default)]
    #[validate(nested)]
    pub watermark: Option<WatermarkConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub s3_path: String,
    /// One of `top-left`, `top-right`, `bottom-left`, `center`, `bottom-right`.
    #[serde(default)]
    pub position: String,
    /// Watermark width as a percentage of the video width.
    #[serde(default = "default_watermark_size")]
    #[validate(range(min = 1, max = 100, message = "size must be between 1 and 100"))]
    pub size: u32,
    /// 0 (transparent) to 100 (opaque); out-of-range values are clamped.
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
}

impl ConvertRequest {
    /// Requested qualities with repeats dropped, in first-seen order.
    pub fn distinct_qualities(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.qualities.len());
        for q in &self.qualities {
            if !seen.contains(&q.as_str()) {
                seen.push(q);
            }
        }
        seen
    }
}

fn validate_callback_url(url: &str) -> Result<(), ValidationError> {
    if url.trim().is_empty() || url.validate_url() {
        return Ok(());
    }
    let mut err = ValidationError::new("url");
    err.message = Some("callback_url must be a valid URL".into());
    Err(err)
}

fn default_watermark_size() -> u32 {
    10
}

fn default_watermark_opacity() -> f64 {
    100.0
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    pub conversion_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub active_jobs: usize,
}
