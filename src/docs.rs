use utoipa::OpenApi;
use crate::modules::conversion::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::conversion::handler::convert,
        crate::modules::conversion::handler::cancel,
        crate::modules::conversion::handler::health,
    ),
    components(
        schemas(
            ConvertRequest, WatermarkConfig, ConvertResponse, CancelResponse, HealthResponse,
        )
    ),
    tags(
        (name = "HLS", description = "HLS conversion jobs")
    )
)]
pub struct ApiDoc;
