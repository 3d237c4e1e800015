//! HTTP router assembly.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::assessment::{AssessmentRouteState, PersistenceCoordinator, assessment_routes};
use crate::auth::IdentityProvider;
use crate::config::ReportConfig;
use crate::reference::{ReferenceData, reference_routes};
use crate::reporting::{AdminRouteState, ReportService, admin_routes};
use crate::store::AssessmentStore;

/// Everything the router needs.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn AssessmentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub reference: Arc<dyn ReferenceData>,
    pub reports: ReportConfig,
    pub enforce_finish_validation: bool,
    /// Allowed CORS origins; `None` allows any.
    pub cors_origins: Option<Vec<String>>,
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ev-readiness",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        None => AllowOrigin::from(Any),
        Some(list) => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(origin = %o, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(parsed)
        }
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::IF_MATCH,
        ])
        .expose_headers([HeaderName::from_static("etag")])
}

/// Build the full application router.
pub fn app_router(ctx: AppContext) -> Router {
    let coordinator = Arc::new(PersistenceCoordinator::new(Arc::clone(&ctx.store)));
    let reports = Arc::new(ReportService::new(Arc::clone(&ctx.store), ctx.reports));

    let assessment = assessment_routes(AssessmentRouteState {
        coordinator,
        enforce_finish_validation: ctx.enforce_finish_validation,
    });
    let admin = admin_routes(AdminRouteState {
        reports,
        identity: Arc::clone(&ctx.identity),
    });

    Router::new()
        .route("/health", get(health))
        .merge(assessment)
        .merge(admin)
        .merge(reference_routes(Arc::clone(&ctx.reference)))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(ctx.cors_origins.as_deref())),
        )
}
