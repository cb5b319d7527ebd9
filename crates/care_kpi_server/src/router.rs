//! Router construction for the care KPI server.

use std::sync::Arc;

use axum::{middleware as axum_mw, routing::get, Extension, Router};
use care_kpi_core::KpiService;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};

pub fn build_router(service: Arc<dyn KpiService>, jwt_config: JwtConfig) -> Router {
    let protected = Router::new()
        .route("/kpi/general", get(handlers::kpi::general))
        .route(
            "/kpi/care-plans-by-setting",
            get(handlers::kpi::care_plans_by_setting),
        )
        .route("/kpi/overview", get(handlers::kpi::overview))
        .route("/kpi/care-settings", get(handlers::kpi::care_settings))
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    let public = Router::new().route("/health", get(handlers::health::health));

    public
        .merge(protected)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
}
