//! REST API endpoint for analysis runs

use actix_web::{HttpResponse, post, web};

use crate::api::error::{ApiError, ErrorResponse};
use crate::app::AppState;
use crate::model::{AnalysisRequest, StructuredResult};

/// Run phased extraction and traceability over the supplied context
///
/// Runs beyond `server.max_concurrent_runs` wait for a free slot. A run that
/// is interrupted by shutdown returns the completed phases with `partial` set.
#[utoipa::path(
    post,
    path = "/v1/analysis",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Analysis completed", body = StructuredResult),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Generative oracle or chunk retrieval unavailable", body = ErrorResponse),
        (status = 503, description = "Server is shutting down", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/v1/analysis")]
pub async fn analyze(
    state: web::Data<AppState>,
    body: web::Json<AnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();

    if request.context_chunks.iter().all(|c| c.content.trim().is_empty())
        && request.proposal_text.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "at least one context chunk or a proposal text is required".to_string(),
        ));
    }

    let _permit = state
        .run_limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Unavailable("run limiter closed".to_string()))?;

    if state.shutdown.is_cancelled() {
        return Err(ApiError::Unavailable("server is shutting down".to_string()));
    }

    let cancel = state.shutdown.child_token();
    let result = state.pipeline.run(request, &cancel).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze);
}
