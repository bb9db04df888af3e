use crate::{
    entities::shipping_zone, errors::ServiceError, services::zones::NewZone, ApiResponse,
    ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct ZoneSummary {
    pub id: Uuid,
    pub name: String,
    pub countries: Vec<String>,
    pub is_active: bool,
}

impl From<shipping_zone::Model> for ZoneSummary {
    fn from(model: shipping_zone::Model) -> Self {
        let countries = model.member_countries();
        Self {
            id: model.id,
            name: model.name,
            countries,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub tenant_id: Uuid,
    pub country: String,
}

/// Every active zone containing the country. An empty list is a valid
/// answer meaning "no rate available for this destination".
pub async fn resolve_zones(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> ApiResult<Vec<ZoneSummary>> {
    let zones = state
        .services
        .zones
        .resolve_zones(query.tenant_id, &query.country)
        .await?;
    Ok(Json(ApiResponse::success(
        zones.into_iter().map(ZoneSummary::from).collect(),
    )))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateZoneRequest {
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub countries: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create_zone(
    State(state): State<AppState>,
    Json(payload): Json<CreateZoneRequest>,
) -> ApiResult<ZoneSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let zone = state
        .services
        .zones
        .create_zone(NewZone {
            tenant_id: payload.tenant_id,
            name: payload.name,
            countries: payload.countries,
            is_active: payload.is_active,
        })
        .await?;
    Ok(Json(ApiResponse::success(ZoneSummary::from(zone))))
}

pub async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ZoneSummary> {
    let zone = state.services.zones.get_zone(id).await?;
    Ok(Json(ApiResponse::success(ZoneSummary::from(zone))))
}

pub async fn delete_zone(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Uuid> {
    state.services.zones.delete_zone(id).await?;
    Ok(Json(ApiResponse::success(id)))
}
