use super::dto::{CancelResponse, ConvertRequest, ConvertResponse, HealthResponse};
use super::service::ConversionService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use validator::Validate;

/// Queue a source file for HLS conversion
#[utoipa::path(
    post,
    path = "/api/hls/convert",
    request_body = ConvertRequest,
    responses(
        (status = 202, description = "Conversion queued", body = ConvertResponse),
        (status = 400, description = "Invalid request", body = ApiResponse<String>),
        (status = 503, description = "Queue is shut down", body = ApiResponse<String>)
    ),
    tag = "HLS"
)]
pub async fn convert(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => {
            return ApiError(format!("Invalid JSON: {}", e.body_text()), StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    if let Err(e) = req.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match ConversionService::submit(state, req).await {
        Ok(res) => ApiSuccess(res, StatusCode::ACCEPTED).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response(),
    }
}

/// Cancel a queued or running conversion
#[utoipa::path(
    delete,
    path = "/api/hls/{conversion_id}",
    params(
        ("conversion_id" = String, Path, description = "Conversion ID")
    ),
    responses(
        (status = 200, description = "Conversion cancelled", body = CancelResponse),
        (status = 404, description = "Conversion not found", body = CancelResponse)
    ),
    tag = "HLS"
)]
pub async fn cancel(
    State(state): State<AppState>,
    Path(conversion_id): Path<String>,
) -> impl IntoResponse {
    if ConversionService::cancel(&state, &conversion_id) {
        info!(job_id = %conversion_id, "Conversion cancelled via API");
        ApiSuccess(
            CancelResponse {
                success: true,
                message: "Conversion cancelled".to_string(),
            },
            StatusCode::OK,
        )
        .into_response()
    } else {
        ApiSuccess(
            CancelResponse {
                success: false,
                message: "Conversion not found".to_string(),
            },
            StatusCode::NOT_FOUND,
        )
        .into_response()
    }
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/api/hls/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "HLS"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_jobs: state.queue.active_jobs(),
    })
}
