use crate::{
    entities::package_bin_assignment, services::bins::BinAvailability, ApiResponse, ApiResult,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct AssignmentSummary {
    pub id: Uuid,
    pub package_id: Uuid,
    pub bin_location_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
    pub assign_reason: Option<String>,
    pub remove_reason: Option<String>,
    pub is_active: bool,
}

impl From<package_bin_assignment::Model> for AssignmentSummary {
    fn from(model: package_bin_assignment::Model) -> Self {
        let is_active = model.is_active();
        Self {
            id: model.id,
            package_id: model.package_id,
            bin_location_id: model.bin_location_id,
            assigned_at: model.assigned_at,
            removed_at: model.removed_at,
            assign_reason: model.assign_reason,
            remove_reason: model.remove_reason,
            is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub package_id: Uuid,
    pub bin_location_id: Uuid,
    pub reason: Option<String>,
    pub actor_id: Uuid,
}

pub async fn assign_package(
    State(state): State<AppState>,
    Json(payload): Json<AssignRequest>,
) -> ApiResult<AssignmentSummary> {
    let assignment = state
        .services
        .bins
        .assign(
            payload.package_id,
            payload.bin_location_id,
            payload.reason,
            payload.actor_id,
        )
        .await?;
    Ok(Json(ApiResponse::success(AssignmentSummary::from(
        assignment,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub reason: Option<String>,
    pub actor_id: Uuid,
}

/// Ends the package's active assignment. `data` is true when an assignment
/// was actually removed.
pub async fn remove_package(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
    Json(payload): Json<RemoveRequest>,
) -> ApiResult<bool> {
    let removed = state
        .services
        .bins
        .remove_by_package(package_id, payload.reason, payload.actor_id)
        .await?;
    Ok(Json(ApiResponse::success(removed)))
}

pub async fn available_bins(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> ApiResult<Vec<BinAvailability>> {
    let bins = state.services.bins.get_available_bins(warehouse_id).await?;
    Ok(Json(ApiResponse::success(bins)))
}

pub async fn assignment_history(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
) -> ApiResult<Vec<AssignmentSummary>> {
    let history = state.services.bins.assignment_history(package_id).await?;
    Ok(Json(ApiResponse::success(
        history.into_iter().map(AssignmentSummary::from).collect(),
    )))
}
