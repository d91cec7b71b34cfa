//! Health check endpoint.
//!
//! - `/health` – liveness check that also probes the persistence
//!   collaborator, per `SPEC_FULL.md` §8's supplemented health endpoint.
//!
//! The endpoint includes a `Cache-Control: no-cache` header to prevent
//! caching of responses, matching the teacher's health endpoint.

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::TallyApiArgs;

/// Creates a router containing the health endpoint.
pub(crate) fn routes(args: TallyApiArgs) -> Router {
    Router::new()
        .route("/health", get(move || health(args.clone())))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
}

/// Liveness check. Reports unhealthy if the election store cannot serve a
/// trivial round-trip; the service has no other collaborator whose
/// unavailability should flip a load balancer.
async fn health(args: TallyApiArgs) -> impl IntoResponse {
    match args.store.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    }
}
