//! Shipping rate repository and overlap guard.
//!
//! Active rates sharing a (warehouse, zone, service tier) scope must never
//! have overlapping effective windows. The check-and-insert runs inside a
//! transaction with the scope's rows locked, so two writers racing for the
//! same window cannot both commit.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::shipment;
use crate::entities::shipping_rate::{self, Entity as RateEntity};
use crate::entities::shipping_zone;
use crate::entities::warehouse;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Input for creating a rate.
#[derive(Debug, Clone)]
pub struct NewRate {
    pub tenant_id: Uuid,
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
}

/// Partial update for a rate. Unset fields are left unchanged;
/// `effective_until` and `max_weight_kg` use a double Option so the caller
/// can distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct RatePatch {
    pub base_rate: Option<Decimal>,
    pub per_kg_rate: Option<Decimal>,
    pub min_charge: Option<Decimal>,
    pub max_weight_kg: Option<Option<Decimal>>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<Option<NaiveDate>>,
}

/// True when two inclusive effective windows overlap. An open end is
/// treated as "forever".
pub(crate) fn windows_overlap(
    a_from: NaiveDate,
    a_until: Option<NaiveDate>,
    b_from: NaiveDate,
    b_until: Option<NaiveDate>,
) -> bool {
    match (a_until, b_until) {
        (None, None) => true,
        (None, Some(b_end)) => a_from <= b_end,
        (Some(a_end), None) => b_from <= a_end,
        (Some(a_end), Some(b_end)) => a_from <= b_end && b_from <= a_end,
    }
}

fn validate_window(from: NaiveDate, until: Option<NaiveDate>) -> Result<(), ServiceError> {
    if let Some(until) = until {
        if until <= from {
            return Err(ServiceError::InvalidRange(format!(
                "effective_until {until} must be after effective_from {from}"
            )));
        }
    }
    Ok(())
}

fn validate_money(label: &str, value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{label} must not be negative"
        )));
    }
    Ok(())
}

fn validate_currency(code: &str) -> Result<(), ServiceError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ServiceError::ValidationError(format!(
            "'{code}' is not a three-letter currency code"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct RateService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl RateService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Rejects the write when `[from, until]` overlaps any *other* active
    /// rate in the same scope.
    ///
    /// Serialization anchor: the zone row is locked first. Locking only the
    /// matching rates locks nothing when the scope is empty, and a blocked
    /// writer re-reading under READ COMMITTED would miss a freshly inserted
    /// row; the always-present zone row makes racing writers queue here.
    async fn guard_overlap(
        txn: &DatabaseTransaction,
        warehouse_id: Uuid,
        zone_id: Uuid,
        service_tier: &str,
        from: NaiveDate,
        until: Option<NaiveDate>,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        shipping_zone::Entity::find_by_id(zone_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Zone {zone_id} not found")))?;

        let mut query = RateEntity::find()
            .filter(shipping_rate::Column::WarehouseId.eq(warehouse_id))
            .filter(shipping_rate::Column::ZoneId.eq(zone_id))
            .filter(shipping_rate::Column::ServiceTier.eq(service_tier))
            .filter(shipping_rate::Column::IsActive.eq(true));
        if let Some(id) = exclude {
            query = query.filter(shipping_rate::Column::Id.ne(id));
        }

        let existing = query.lock_exclusive().all(txn).await?;
        for rate in existing {
            if windows_overlap(
                rate.effective_from,
                rate.effective_until,
                from,
                until,
            ) {
                return Err(ServiceError::RateOverlap {
                    conflicting_rate_id: rate.id,
                    from: rate.effective_from,
                    until: rate
                        .effective_until
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "open-ended".to_string()),
                });
            }
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(warehouse_id = %input.warehouse_id, zone_id = %input.zone_id, tier = %input.service_tier))]
    pub async fn create_rate(
        &self,
        input: NewRate,
    ) -> Result<shipping_rate::Model, ServiceError> {
        validate_window(input.effective_from, input.effective_until)?;
        validate_money("base_rate", input.base_rate)?;
        validate_money("per_kg_rate", input.per_kg_rate)?;
        validate_money("min_charge", input.min_charge)?;
        if let Some(max_weight) = input.max_weight_kg {
            if max_weight <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "max_weight_kg must be positive".to_string(),
                ));
            }
        }
        validate_currency(&input.currency)?;

        let warehouse = warehouse::Entity::find_by_id(input.warehouse_id)
            .filter(warehouse::Column::TenantId.eq(input.tenant_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", input.warehouse_id))
            })?;

        shipping_zone::Entity::find_by_id(input.zone_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Zone {} not found", input.zone_id)))?;

        let rate = self
            .db
            .transaction::<_, shipping_rate::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    if input.is_active {
                        Self::guard_overlap(
                            txn,
                            input.warehouse_id,
                            input.zone_id,
                            &input.service_tier,
                            input.effective_from,
                            input.effective_until,
                            None,
                        )
                        .await?;
                    }

                    let model = shipping_rate::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(input.tenant_id),
                        warehouse_id: Set(input.warehouse_id),
                        zone_id: Set(input.zone_id),
                        service_tier: Set(input.service_tier.clone()),
                        base_rate: Set(input.base_rate),
                        per_kg_rate: Set(input.per_kg_rate),
                        min_charge: Set(input.min_charge),
                        max_weight_kg: Set(input.max_weight_kg),
                        currency: Set(input.currency.clone()),
                        is_active: Set(input.is_active),
                        effective_from: Set(input.effective_from),
                        effective_until: Set(input.effective_until),
                        created_at: Set(Utc::now()),
                        updated_at: Set(None),
                    };
                    Ok(model.insert(txn).await?)
                })
            })
            .await?;

        info!(rate_id = %rate.id, warehouse = %warehouse.code, "created shipping rate");
        let _ = self
            .event_sender
            .send(Event::RateCreated {
                rate_id: rate.id,
                warehouse_id: rate.warehouse_id,
                zone_id: rate.zone_id,
                service_tier: rate.service_tier.clone(),
            })
            .await;
        Ok(rate)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_rate(
        &self,
        id: Uuid,
        patch: RatePatch,
    ) -> Result<shipping_rate::Model, ServiceError> {
        if let Some(base) = patch.base_rate {
            validate_money("base_rate", base)?;
        }
        if let Some(per_kg) = patch.per_kg_rate {
            validate_money("per_kg_rate", per_kg)?;
        }
        if let Some(min) = patch.min_charge {
            validate_money("min_charge", min)?;
        }
        if let Some(currency) = &patch.currency {
            validate_currency(currency)?;
        }

        let updated = self
            .db
            .transaction::<_, shipping_rate::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let current = RateEntity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Rate {id} not found")))?;

                    let effective_from = patch.effective_from.unwrap_or(current.effective_from);
                    let effective_until = patch
                        .effective_until
                        .unwrap_or(current.effective_until);
                    let is_active = patch.is_active.unwrap_or(current.is_active);
                    validate_window(effective_from, effective_until)?;

                    if is_active {
                        Self::guard_overlap(
                            txn,
                            current.warehouse_id,
                            current.zone_id,
                            &current.service_tier,
                            effective_from,
                            effective_until,
                            Some(id),
                        )
                        .await?;
                    }

                    let mut active: shipping_rate::ActiveModel = current.into();
                    if let Some(base) = patch.base_rate {
                        active.base_rate = Set(base);
                    }
                    if let Some(per_kg) = patch.per_kg_rate {
                        active.per_kg_rate = Set(per_kg);
                    }
                    if let Some(min) = patch.min_charge {
                        active.min_charge = Set(min);
                    }
                    if let Some(max_weight) = patch.max_weight_kg {
                        active.max_weight_kg = Set(max_weight);
                    }
                    if let Some(currency) = patch.currency {
                        active.currency = Set(currency);
                    }
                    active.is_active = Set(is_active);
                    active.effective_from = Set(effective_from);
                    active.effective_until = Set(effective_until);
                    active.updated_at = Set(Some(Utc::now()));

                    Ok(active.update(txn).await?)
                })
            })
            .await?;

        info!(rate_id = %id, "updated shipping rate");
        let _ = self.event_sender.send(Event::RateUpdated(id)).await;
        Ok(updated)
    }

    /// Deletes a rate. Refused while a shipment references the rate's zone;
    /// deactivating via `update_rate` is the usual path for retiring rates.
    #[instrument(skip(self))]
    pub async fn delete_rate(&self, id: Uuid) -> Result<(), ServiceError> {
        let rate = RateEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Rate {id} not found")))?;

        let shipments = shipment::Entity::find()
            .filter(shipment::Column::ZoneId.eq(rate.zone_id))
            .count(&*self.db)
            .await?;
        if shipments > 0 {
            return Err(ServiceError::InUse(format!(
                "Rate {id} covers zone {} which is referenced by {shipments} shipment(s)",
                rate.zone_id
            )));
        }

        rate.delete(&*self.db).await?;
        info!(rate_id = %id, "deleted shipping rate");
        let _ = self.event_sender.send(Event::RateDeleted(id)).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_rate(&self, id: Uuid) -> Result<shipping_rate::Model, ServiceError> {
        RateEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Rate {id} not found")))
    }

    /// Lists rates for a warehouse with pagination.
    #[instrument(skip(self))]
    pub async fn list_rates(
        &self,
        warehouse_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<shipping_rate::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 500 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 500".to_string(),
            ));
        }

        let paginator = RateEntity::find()
            .filter(shipping_rate::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(shipping_rate::Column::ServiceTier)
            .order_by_asc(shipping_rate::Column::EffectiveFrom)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let rates = paginator.fetch_page(page - 1).await?;
        Ok((rates, total))
    }

    /// Rates usable for a quote: active, effective on `on`, in one of the
    /// candidate zones, and able to carry `weight_kg`. Ordered by tier then
    /// ascending base rate; that ordering defines quote presentation order.
    #[instrument(skip(self, zone_ids))]
    pub async fn find_effective(
        &self,
        warehouse_id: Uuid,
        zone_ids: &[Uuid],
        service_tier: Option<&str>,
        on: NaiveDate,
        weight_kg: Decimal,
    ) -> Result<Vec<shipping_rate::Model>, ServiceError> {
        if zone_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = RateEntity::find()
            .filter(shipping_rate::Column::WarehouseId.eq(warehouse_id))
            .filter(shipping_rate::Column::ZoneId.is_in(zone_ids.iter().copied()))
            .filter(shipping_rate::Column::IsActive.eq(true))
            .filter(shipping_rate::Column::EffectiveFrom.lte(on))
            .filter(
                Condition::any()
                    .add(shipping_rate::Column::EffectiveUntil.is_null())
                    .add(shipping_rate::Column::EffectiveUntil.gte(on)),
            )
            .filter(
                Condition::any()
                    .add(shipping_rate::Column::MaxWeightKg.is_null())
                    .add(shipping_rate::Column::MaxWeightKg.gte(weight_kg)),
            );
        if let Some(tier) = service_tier {
            query = query.filter(shipping_rate::Column::ServiceTier.eq(tier));
        }

        Ok(query
            .order_by_asc(shipping_rate::Column::ServiceTier)
            .order_by_asc(shipping_rate::Column::BaseRate)
            .all(&*self.db)
            .await?)
    }
}
