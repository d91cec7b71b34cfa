//! Info endpoint.
//!
//! - `/version` – cargo package name and version.
//!
//! The endpoint includes a `Cache-Control: no-cache` header, matching the
//! teacher's info endpoint.

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::set_header::SetResponseHeaderLayer;

/// Creates a router containing the info endpoints.
pub(crate) fn routes() -> Router {
    Router::new()
        .route("/version", get(version))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
}

async fn version() -> impl IntoResponse {
    (StatusCode::OK, crate::version::version_info())
}
