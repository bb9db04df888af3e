use crate::{
    entities::shipping_rate,
    errors::ServiceError,
    services::rates::{NewRate, RatePatch},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct RateSummary {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub zone_id: Uuid,
    pub service_tier: String,
    pub base_rate: Decimal,
    pub per_kg_rate: Decimal,
    pub min_charge: Decimal,
    pub max_weight_kg: Option<Decimal>,
    pub currency: String,
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<shipping_rate::Model> for RateSummary {
    fn from(model: shipping_rate::Model) -> Self {
        Self {
            id: model.id,
            warehouse_id: model.warehouse_id,
            zone_id: model.zone_id,
            service_tier: model.service_tier,
            base_rate: model.base_rate,
            per_kg_rate: model.per_kg_rate,
            min_charge: model.min_charge,
            max_weight_kg: model.max_weight_kg,
            currency: model.currency,
            is_active: model.is_active,
            effective_from: model.effective_from,
            effective_until: model.effective_until,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRateRequest {
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub zone_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub service_tier: String,
    pub base_rate: Decimal,
    pub per_kg_rate: Decimal,
    pub min_charge: Decimal,
    pub max_weight_kg: Option<Decimal>,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateRateRequest {
    pub base_rate: Option<Decimal>,
    pub per_kg_rate: Option<Decimal>,
    pub min_charge: Option<Decimal>,
    /// Present-and-null clears the weight cap
    #[serde(default, with = "double_option")]
    pub max_weight_kg: Option<Option<Decimal>>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
    pub effective_from: Option<NaiveDate>,
    /// Present-and-null makes the rate open-ended
    #[serde(default, with = "double_option")]
    pub effective_until: Option<Option<NaiveDate>>,
}

/// Distinguishes an absent JSON field from an explicit null.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(de).map(Some)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RateListQuery {
    pub warehouse_id: Uuid,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub async fn list_rates(
    State(state): State<AppState>,
    Query(query): Query<RateListQuery>,
) -> ApiResult<PaginatedResponse<RateSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (records, total) = state
        .services
        .rates
        .list_rates(query.warehouse_id, page, limit)
        .await?;
    let items: Vec<RateSummary> = records.into_iter().map(RateSummary::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn get_rate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RateSummary> {
    let rate = state.services.rates.get_rate(id).await?;
    Ok(Json(ApiResponse::success(RateSummary::from(rate))))
}

pub async fn create_rate(
    State(state): State<AppState>,
    Json(payload): Json<CreateRateRequest>,
) -> ApiResult<RateSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let rate = state
        .services
        .rates
        .create_rate(NewRate {
            tenant_id: payload.tenant_id,
            warehouse_id: payload.warehouse_id,
            zone_id: payload.zone_id,
            service_tier: payload.service_tier,
            base_rate: payload.base_rate,
            per_kg_rate: payload.per_kg_rate,
            min_charge: payload.min_charge,
            max_weight_kg: payload.max_weight_kg,
            currency: payload.currency,
            is_active: payload.is_active,
            effective_from: payload.effective_from,
            effective_until: payload.effective_until,
        })
        .await?;

    Ok(Json(ApiResponse::success(RateSummary::from(rate))))
}

pub async fn update_rate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRateRequest>,
) -> ApiResult<RateSummary> {
    let rate = state
        .services
        .rates
        .update_rate(
            id,
            RatePatch {
                base_rate: payload.base_rate,
                per_kg_rate: payload.per_kg_rate,
                min_charge: payload.min_charge,
                max_weight_kg: payload.max_weight_kg,
                currency: payload.currency,
                is_active: payload.is_active,
                effective_from: payload.effective_from,
                effective_until: payload.effective_until,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(RateSummary::from(rate))))
}

pub async fn delete_rate(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Uuid> {
    state.services.rates.delete_rate(id).await?;
    Ok(Json(ApiResponse::success(id)))
}
