//! Public REST endpoints for the survey wizard.
//!
//! `PUT /assessment/{id}` takes the whole document: `currentPage` is the
//! target page and `isComplete` marks the finishing save. An optional
//! `If-Match` header carries the expected document version.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AssessmentError, ErrorBody};

use super::coordinator::PersistenceCoordinator;
use super::model::{
    Assessment, ChargerLocationInfo, Classification, ElectricalPanelInfo, EvChargerInfo,
    HomeInfo, PersonalInfo, VehicleInfo,
};
use super::progression::{StepView, WizardPosition, WizardSession};
use super::steps::{self, StepFailure};

/// Shared state for assessment routes.
#[derive(Clone)]
pub struct AssessmentRouteState {
    pub coordinator: Arc<PersistenceCoordinator>,
    /// Run the finish validation on `PUT` bodies with `isComplete: true`.
    pub enforce_finish_validation: bool,
}

/// `?partitionKey=` on every point read and write.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionQuery {
    pub partition_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateBody {
    personal_info: Option<PersonalInfo>,
}

/// Body of a step save. Identity and server-assigned fields in the body
/// are ignored; the path and query identify the document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SaveStepBody {
    current_page: u32,
    is_complete: bool,
    personal_info: Option<PersonalInfo>,
    vehicle_info: Option<VehicleInfo>,
    electrical_panel: Option<ElectricalPanelInfo>,
    charger_location: Option<ChargerLocationInfo>,
    home_info: Option<HomeInfo>,
    ev_charger: Option<EvChargerInfo>,
}

impl SaveStepBody {
    fn into_snapshot(self, id: Uuid, customer_id: &str) -> Assessment {
        let mut doc = Assessment::new(customer_id);
        doc.id = id;
        doc.current_page = self.current_page;
        doc.personal_info = self.personal_info;
        doc.vehicle_info = self.vehicle_info;
        doc.electrical_panel = self.electrical_panel;
        doc.charger_location = self.charger_location;
        doc.home_info = self.home_info;
        doc.ev_charger = self.ev_charger;
        doc
    }
}

/// Resumed wizard state for a stored document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressView {
    id: Uuid,
    customer_id: String,
    position: WizardPosition,
    current_page: u32,
    classification: Classification,
    can_finish: bool,
    steps: Vec<StepView>,
    failures: Vec<StepFailure>,
}

impl IntoResponse for AssessmentError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OutOfRange { .. } => StatusCode::BAD_REQUEST,
            Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedDocument { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if self.is_transient() {
            warn!(error = %self, "Store unavailable");
        }
        let failures = match &self {
            Self::ValidationFailed { failures } => Some(failures.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            failures,
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message.into()})),
    )
        .into_response()
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| bad_request("Invalid assessment ID"))
}

/// Quoted version, as sent in `ETag` and accepted in `If-Match`.
pub(crate) fn etag(version: i64) -> String {
    format!("\"{version}\"")
}

/// Expected version from `If-Match`. `*` and an absent header both mean
/// "no check".
fn if_match_version(headers: &HeaderMap) -> Result<Option<i64>, String> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| "If-Match header is not valid text".to_string())?;
    let token = raw.trim().trim_start_matches("W/").trim_matches('"');
    if token == "*" {
        return Ok(None);
    }
    token
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("Invalid If-Match value: {raw}"))
}

fn document_response(status: StatusCode, doc: Assessment) -> Response {
    (status, [(header::ETAG, etag(doc.version))], Json(doc)).into_response()
}

/// POST /assessment
///
/// Allocates id and partition key and stores an empty document at page 0.
async fn create_assessment(
    State(state): State<AssessmentRouteState>,
    Json(body): Json<CreateBody>,
) -> Response {
    match state.coordinator.create_assessment(body.personal_info).await {
        Ok(key) => (StatusCode::CREATED, Json(key)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /assessment/{id}?partitionKey=
async fn get_assessment(
    State(state): State<AssessmentRouteState>,
    Path(id): Path<String>,
    Query(q): Query<PartitionQuery>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.coordinator.load_assessment(id, &q.partition_key).await {
        Ok(doc) => document_response(StatusCode::OK, doc),
        Err(e) => e.into_response(),
    }
}

/// PUT /assessment/{id}?partitionKey=
///
/// Whole-document replace for a step save or the finishing save.
async fn save_assessment(
    State(state): State<AssessmentRouteState>,
    Path(id): Path<String>,
    Query(q): Query<PartitionQuery>,
    headers: HeaderMap,
    Json(body): Json<SaveStepBody>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let expected_version = match if_match_version(&headers) {
        Ok(v) => v,
        Err(msg) => return bad_request(msg),
    };

    let target_page = body.current_page;
    let is_final = body.is_complete;
    let snapshot = body.into_snapshot(id, &q.partition_key);

    if is_final && state.enforce_finish_validation {
        let failures = steps::validate_all(&snapshot);
        if !failures.is_empty() {
            info!(id = %id, failing = failures.len(), "Finish refused");
            return AssessmentError::ValidationFailed { failures }.into_response();
        }
    }

    match state
        .coordinator
        .save_step(
            id,
            &q.partition_key,
            &snapshot,
            target_page,
            is_final,
            expected_version,
        )
        .await
    {
        Ok(doc) => document_response(StatusCode::OK, doc),
        Err(e) => e.into_response(),
    }
}

/// GET /assessment/{id}/progress?partitionKey=
///
/// Per-step statuses and finish readiness for a stored document.
async fn get_progress(
    State(state): State<AssessmentRouteState>,
    Path(id): Path<String>,
    Query(q): Query<PartitionQuery>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let doc = match state.coordinator.load_assessment(id, &q.partition_key).await {
        Ok(doc) => doc,
        Err(e) => return e.into_response(),
    };

    let session = WizardSession::resume(doc);
    let failures = session.finish_failures();
    let doc = session.document();
    let view = ProgressView {
        id: doc.id,
        customer_id: doc.customer_id.clone(),
        position: session.position(),
        current_page: doc.current_page,
        classification: doc.classification(),
        can_finish: failures.is_empty(),
        steps: session.step_views(),
        failures,
    };
    Json(view).into_response()
}

/// Build the wizard REST routes.
pub fn assessment_routes(state: AssessmentRouteState) -> Router {
    Router::new()
        .route("/assessment", post(create_assessment))
        .route(
            "/assessment/{id}",
            get(get_assessment).put(save_assessment),
        )
        .route("/assessment/{id}/progress", get(get_progress))
        .with_state(state)
}
