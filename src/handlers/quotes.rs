use crate::{
    errors::ServiceError,
    services::quotes::{QuoteRequest, RateQuote},
    ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, response::Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CalculateQuoteRequest {
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 2, max = 2))]
    pub destination_country: String,
    pub service_tier: Option<String>,
    pub weight_kg: Decimal,
    pub declared_value: Decimal,
    #[validate(length(min = 3, max = 3))]
    pub declared_currency: String,
}

/// Returns one quote per rate effective today for the destination. An empty
/// list means no zone or rate covers the destination.
pub async fn calculate_quotes(
    State(state): State<AppState>,
    Json(payload): Json<CalculateQuoteRequest>,
) -> ApiResult<Vec<RateQuote>> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let quotes = state
        .services
        .quotes
        .calculate(QuoteRequest {
            tenant_id: payload.tenant_id,
            warehouse_id: payload.warehouse_id,
            destination_country: payload.destination_country,
            service_tier: payload.service_tier,
            weight_kg: payload.weight_kg,
            declared_value: payload.declared_value,
            declared_currency: payload.declared_currency,
        })
        .await?;

    Ok(Json(ApiResponse::success(quotes)))
}
