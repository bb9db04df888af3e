use crate::{
    entities::{storage_charge, storage_pricing_policy},
    errors::ServiceError,
    services::storage::NewPolicy,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct ChargeSummary {
    pub id: Uuid,
    pub package_id: Uuid,
    pub charge_from: NaiveDate,
    pub charge_to: NaiveDate,
    pub total_days: i32,
    pub free_days_applied: i32,
    pub chargeable_days: i32,
    pub base_fee: Decimal,
    pub bin_fee: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub notes: String,
    pub is_invoiced: bool,
}

impl From<storage_charge::Model> for ChargeSummary {
    fn from(model: storage_charge::Model) -> Self {
        Self {
            id: model.id,
            package_id: model.package_id,
            charge_from: model.charge_from,
            charge_to: model.charge_to,
            total_days: model.total_days,
            free_days_applied: model.free_days_applied,
            chargeable_days: model.chargeable_days,
            base_fee: model.base_fee,
            bin_fee: model.bin_fee,
            total_amount: model.total_amount,
            currency: model.currency,
            notes: model.notes,
            is_invoiced: model.is_invoiced,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CalculateChargeRequest {
    pub package_id: Uuid,
    pub warehouse_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

pub async fn calculate_charge(
    State(state): State<AppState>,
    Json(payload): Json<CalculateChargeRequest>,
) -> ApiResult<ChargeSummary> {
    let charge = state
        .services
        .storage
        .calculate_charge(
            payload.package_id,
            payload.warehouse_id,
            payload.from_date,
            payload.to_date,
        )
        .await?;
    Ok(Json(ApiResponse::success(ChargeSummary::from(charge))))
}

pub async fn list_charges(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
) -> ApiResult<Vec<ChargeSummary>> {
    let charges = state.services.storage.list_charges(package_id).await?;
    Ok(Json(ApiResponse::success(
        charges.into_iter().map(ChargeSummary::from).collect(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct MarkInvoicedRequest {
    pub charge_ids: Vec<Uuid>,
    pub invoice_id: Uuid,
}

/// Entry point for the invoicing subsystem: claims charges for an invoice
/// and reports how many rows were newly flagged.
pub async fn mark_invoiced(
    State(state): State<AppState>,
    Json(payload): Json<MarkInvoicedRequest>,
) -> ApiResult<u64> {
    let claimed = state
        .services
        .storage
        .mark_invoiced(payload.charge_ids, payload.invoice_id)
        .await?;
    Ok(Json(ApiResponse::success(claimed)))
}

#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub free_days: i32,
    pub daily_rate: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
}

impl From<storage_pricing_policy::Model> for PolicySummary {
    fn from(model: storage_pricing_policy::Model) -> Self {
        Self {
            id: model.id,
            warehouse_id: model.warehouse_id,
            free_days: model.free_days,
            daily_rate: model.daily_rate,
            currency: model.currency,
            is_active: model.is_active,
            effective_from: model.effective_from,
            effective_until: model.effective_until,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePolicyRequest {
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub free_days: i32,
    pub daily_rate: Decimal,
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

pub async fn create_policy(
    State(state): State<AppState>,
    Json(payload): Json<CreatePolicyRequest>,
) -> ApiResult<PolicySummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let policy = state
        .services
        .storage
        .create_policy(NewPolicy {
            tenant_id: payload.tenant_id,
            warehouse_id: payload.warehouse_id,
            free_days: payload.free_days,
            daily_rate: payload.daily_rate,
            currency: payload.currency,
            is_active: payload.is_active,
            effective_from: payload.effective_from,
            effective_until: payload.effective_until,
        })
        .await?;
    Ok(Json(ApiResponse::success(PolicySummary::from(policy))))
}
