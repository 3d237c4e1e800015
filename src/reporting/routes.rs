//! Admin REST endpoints. Every route requires a caller with the admin role.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::assessment::routes::{PartitionQuery, bad_request, parse_id};
use crate::auth::{ADMIN_ROLE, IdentityProvider, authorize};

use super::export::parse_columns;
use super::query::AdminQuery;
use super::service::ReportService;

#[derive(Clone)]
pub struct AdminRouteState {
    pub reports: Arc<ReportService>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportParams {
    columns: Option<String>,
}

/// Role check plus query validation shared by the report handlers.
fn admit(state: &AdminRouteState, headers: &HeaderMap, query: &AdminQuery) -> Result<(), Response> {
    authorize(state.identity.as_ref(), headers, ADMIN_ROLE).map_err(IntoResponse::into_response)?;
    query.validate().map_err(bad_request)
}

/// GET /admin/assessments
async fn list_assessments(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Err(resp) = admit(&state, &headers, &query) {
        return resp;
    }
    match state.reports.list(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/assessments/stats
async fn get_stats(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Err(resp) = admit(&state, &headers, &query) {
        return resp;
    }
    match state.reports.stats(&query).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/assessments/drop-off
async fn get_drop_off(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Err(resp) = admit(&state, &headers, &query) {
        return resp;
    }
    match state.reports.drop_off(&query).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/assessments/charts
async fn get_charts(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Err(resp) = admit(&state, &headers, &query) {
        return resp;
    }
    match state.reports.charts(&query).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/assessments/export?columns=
async fn export_assessments(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
    Query(params): Query<ExportParams>,
) -> Response {
    if let Err(resp) = admit(&state, &headers, &query) {
        return resp;
    }
    let columns = match parse_columns(params.columns.as_deref()) {
        Ok(columns) => columns,
        Err(msg) => return bad_request(msg),
    };
    match state.reports.export(&query, &columns).await {
        Ok(table) => Json(table).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/assessments/{id}?partitionKey=
async fn get_assessment_detail(
    State(state): State<AdminRouteState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<PartitionQuery>,
) -> Response {
    if let Err(e) = authorize(state.identity.as_ref(), &headers, ADMIN_ROLE) {
        return e.into_response();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.reports.detail(id, &q.partition_key).await {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Build the admin routes.
pub fn admin_routes(state: AdminRouteState) -> Router {
    Router::new()
        .route("/admin/assessments", get(list_assessments))
        .route("/admin/assessments/stats", get(get_stats))
        .route("/admin/assessments/drop-off", get(get_drop_off))
        .route("/admin/assessments/charts", get(get_charts))
        .route("/admin/assessments/export", get(export_assessments))
        .route("/admin/assessments/{id}", get(get_assessment_detail))
        .with_state(state)
}
