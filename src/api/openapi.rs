//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::{analysis, error, health};
use crate::model;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arcadia Trace",
        description = "Phased architecture extraction and cross-phase traceability"
    ),
    paths(analysis::analyze, health::liveness, health::readiness),
    components(schemas(
        model::AnalysisRequest,
        model::ContextChunk,
        model::StructuredResult,
        model::PhaseOutput,
        model::TraceabilityLink,
        model::Gap,
        model::ConsistencyCheck,
        error::ErrorResponse,
        health::HealthStatus,
        health::ReadinessStatus,
    )),
    tags(
        (name = "analysis", description = "Architecture extraction and traceability"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
