//! Shipping quote calculation.
//!
//! Resolves candidate zones for the destination, pulls the currently
//! effective rates, and returns one quote per rate with the full numeric
//! breakdown. All money stays in `Decimal` end to end and serializes as
//! exact-decimal strings.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::warehouse;
use crate::errors::ServiceError;
use crate::services::rates::RateService;
use crate::services::zones::ZoneService;

/// Flat fee added to every quote.
const HANDLING_FEE: Decimal = dec!(10);
/// Insurance is 1% of declared value with a 5-unit floor.
const INSURANCE_RATE: Decimal = dec!(0.01);
const INSURANCE_MIN: Decimal = dec!(5);

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub destination_country: String,
    pub service_tier: Option<String>,
    pub weight_kg: Decimal,
    pub declared_value: Decimal,
    pub declared_currency: String,
}

/// One quote per matching rate, carrying every component of the total so a
/// caller can audit how it was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate_id: Uuid,
    pub zone_id: Uuid,
    pub zone_name: String,
    pub service_tier: String,
    pub currency: String,
    pub base_rate: Decimal,
    pub per_kg_rate: Decimal,
    pub weight_kg: Decimal,
    pub weight_charge: Decimal,
    pub subtotal: Decimal,
    pub min_charge: Decimal,
    pub applied_charge: Decimal,
    /// 1% of declared value, floored at 5, in the declared currency
    pub insurance: Decimal,
    pub insurance_currency: String,
    pub handling_fee: Decimal,
    pub total: Decimal,
}

pub(crate) struct Breakdown {
    pub weight_charge: Decimal,
    pub subtotal: Decimal,
    pub applied_charge: Decimal,
    pub insurance: Decimal,
    pub handling_fee: Decimal,
    pub total: Decimal,
}

/// The arithmetic core: the minimum-charge floor strictly dominates the
/// computed subtotal, never averaged or blended.
pub(crate) fn breakdown(
    base_rate: Decimal,
    per_kg_rate: Decimal,
    min_charge: Decimal,
    weight_kg: Decimal,
    declared_value: Decimal,
) -> Breakdown {
    let weight_charge = weight_kg * per_kg_rate;
    let subtotal = base_rate + weight_charge;
    let applied_charge = subtotal.max(min_charge);
    let insurance = (declared_value * INSURANCE_RATE).max(INSURANCE_MIN);
    let total = applied_charge + insurance + HANDLING_FEE;
    Breakdown {
        weight_charge,
        subtotal,
        applied_charge,
        insurance,
        handling_fee: HANDLING_FEE,
        total,
    }
}

#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    zones: ZoneService,
    rates: RateService,
}

impl QuoteService {
    pub fn new(db: Arc<DatabaseConnection>, zones: ZoneService, rates: RateService) -> Self {
        Self { db, zones, rates }
    }

    /// Produces one quote per rate effective today for the destination.
    ///
    /// A destination covered by no zone yields an empty list, not an error;
    /// only an unknown warehouse is a failure.
    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id, country = %request.destination_country))]
    pub async fn calculate(&self, request: QuoteRequest) -> Result<Vec<RateQuote>, ServiceError> {
        self.calculate_on(request, Utc::now().date_naive()).await
    }

    /// Same as [`calculate`](Self::calculate) with an explicit effective
    /// date, used by tests and back-dated quoting.
    pub async fn calculate_on(
        &self,
        request: QuoteRequest,
        on: NaiveDate,
    ) -> Result<Vec<RateQuote>, ServiceError> {
        if request.weight_kg <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "weight_kg must be positive".to_string(),
            ));
        }
        if request.declared_value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "declared_value must not be negative".to_string(),
            ));
        }

        warehouse::Entity::find_by_id(request.warehouse_id)
            .filter(warehouse::Column::TenantId.eq(request.tenant_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", request.warehouse_id))
            })?;

        let zones = self
            .zones
            .resolve_zones(request.tenant_id, &request.destination_country)
            .await?;
        if zones.is_empty() {
            debug!("no zone covers destination, returning empty quote list");
            return Ok(Vec::new());
        }
        let zone_names: HashMap<Uuid, String> =
            zones.iter().map(|z| (z.id, z.name.clone())).collect();
        let zone_ids: Vec<Uuid> = zones.iter().map(|z| z.id).collect();

        let rates = self
            .rates
            .find_effective(
                request.warehouse_id,
                &zone_ids,
                request.service_tier.as_deref(),
                on,
                request.weight_kg,
            )
            .await?;

        let quotes = rates
            .into_iter()
            .map(|rate| {
                let parts = breakdown(
                    rate.base_rate,
                    rate.per_kg_rate,
                    rate.min_charge,
                    request.weight_kg,
                    request.declared_value,
                );
                RateQuote {
                    rate_id: rate.id,
                    zone_id: rate.zone_id,
                    zone_name: zone_names
                        .get(&rate.zone_id)
                        .cloned()
                        .unwrap_or_default(),
                    service_tier: rate.service_tier,
                    currency: rate.currency,
                    base_rate: rate.base_rate,
                    per_kg_rate: rate.per_kg_rate,
                    weight_kg: request.weight_kg,
                    weight_charge: parts.weight_charge,
                    subtotal: parts.subtotal,
                    min_charge: rate.min_charge,
                    applied_charge: parts.applied_charge,
                    insurance: parts.insurance,
                    insurance_currency: request.declared_currency.clone(),
                    handling_fee: parts.handling_fee,
                    total: parts.total,
                }
            })
            .collect();

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn min_charge_floor_dominates_small_subtotal() {
        // base 15, per-kg 3, min 25, 2kg: subtotal 21 loses to the floor.
        let parts = breakdown(dec!(15), dec!(3), dec!(25), dec!(2), dec!(0));
        assert_eq!(parts.weight_charge, dec!(6));
        assert_eq!(parts.subtotal, dec!(21));
        assert_eq!(parts.applied_charge, dec!(25));
    }

    #[test]
    fn subtotal_above_floor_is_charged_as_is() {
        // base 20, per-kg 5, min 10, 3kg: subtotal 35 stands.
        let parts = breakdown(dec!(20), dec!(5), dec!(10), dec!(3), dec!(0));
        assert_eq!(parts.subtotal, dec!(35));
        assert_eq!(parts.applied_charge, dec!(35));
    }

    #[test]
    fn insurance_is_one_percent_with_floor() {
        let parts = breakdown(dec!(0), dec!(0), dec!(0), dec!(1), dec!(1000));
        assert_eq!(parts.insurance, dec!(10.00));

        let parts = breakdown(dec!(0), dec!(0), dec!(0), dec!(1), dec!(100));
        assert_eq!(parts.insurance, dec!(5));
    }

    #[test]
    fn total_sums_charge_insurance_and_handling() {
        let parts = breakdown(dec!(20), dec!(5), dec!(10), dec!(3), dec!(1000));
        assert_eq!(parts.total, dec!(35) + dec!(10.00) + dec!(10));
    }

    #[test]
    fn decimal_breakdown_serializes_as_strings() {
        let parts = breakdown(dec!(15), dec!(3), dec!(25), dec!(2), dec!(0));
        let json = serde_json::to_value(parts.applied_charge).unwrap();
        assert_eq!(json, serde_json::json!("25"));
    }

    fn arb_money() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn applied_charge_never_below_floor(
            base in arb_money(),
            per_kg in arb_money(),
            min in arb_money(),
            weight_grams in 1i64..100_000,
        ) {
            let weight = Decimal::new(weight_grams, 3);
            let parts = breakdown(base, per_kg, min, weight, Decimal::ZERO);
            prop_assert!(parts.applied_charge >= min);
            if parts.subtotal >= min {
                prop_assert_eq!(parts.applied_charge, parts.subtotal);
            } else {
                prop_assert_eq!(parts.applied_charge, min);
            }
        }

        #[test]
        fn insurance_never_below_five(value in arb_money()) {
            let parts = breakdown(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ONE, value);
            prop_assert!(parts.insurance >= INSURANCE_MIN);
        }
    }
}
