//! Storage pricing policies and charge computation.
//!
//! A charge covers an inclusive-start, exclusive-end day span: a 10-day
//! range with a 7-free-day policy bills 3 chargeable days. Charges are
//! immutable once written; only the invoicing flag flips later. Re-billing
//! an already-covered range is rejected by requiring each new charge to
//! start after the package's latest billed day.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::bin_location;
use crate::entities::package::Entity as PackageEntity;
use crate::entities::package_bin_assignment::{self, Entity as AssignmentEntity};
use crate::entities::storage_charge::{self, Entity as ChargeEntity};
use crate::entities::storage_pricing_policy::{self, Entity as PolicyEntity};
use crate::entities::warehouse;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::rates::windows_overlap;

/// Input for creating a storage pricing policy.
#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub free_days: i32,
    pub daily_rate: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub effective_from: NaiveDate,
    pub effective_until: Option<NaiveDate>,
}

/// Splits a positive day span into (free days applied, chargeable days).
pub(crate) fn day_split(total_days: i64, free_days: i32) -> (i32, i32) {
    let free_applied = total_days.min(free_days.max(0) as i64);
    let chargeable = total_days - free_applied;
    (free_applied as i32, chargeable as i32)
}

#[derive(Clone)]
pub struct StorageService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl StorageService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a pricing policy. Overlapping active policies for the same
    /// warehouse are rejected with the same discipline as shipping rates.
    #[instrument(skip(self, input), fields(warehouse_id = %input.warehouse_id))]
    pub async fn create_policy(
        &self,
        input: NewPolicy,
    ) -> Result<storage_pricing_policy::Model, ServiceError> {
        if input.free_days < 0 {
            return Err(ServiceError::ValidationError(
                "free_days must not be negative".to_string(),
            ));
        }
        if input.daily_rate < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "daily_rate must not be negative".to_string(),
            ));
        }
        if let Some(until) = input.effective_until {
            if until <= input.effective_from {
                return Err(ServiceError::InvalidRange(format!(
                    "effective_until {until} must be after effective_from {}",
                    input.effective_from
                )));
            }
        }

        warehouse::Entity::find_by_id(input.warehouse_id)
            .filter(warehouse::Column::TenantId.eq(input.tenant_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", input.warehouse_id))
            })?;

        let policy = self
            .db
            .transaction::<_, storage_pricing_policy::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    if input.is_active {
                        // The warehouse row anchors the scope: locking only
                        // matching policies locks nothing when none exist,
                        // so racing writers must queue on a row that is
                        // always present.
                        warehouse::Entity::find_by_id(input.warehouse_id)
                            .lock_exclusive()
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Warehouse {} not found",
                                    input.warehouse_id
                                ))
                            })?;

                        let existing = PolicyEntity::find()
                            .filter(
                                storage_pricing_policy::Column::WarehouseId
                                    .eq(input.warehouse_id),
                            )
                            .filter(storage_pricing_policy::Column::IsActive.eq(true))
                            .lock_exclusive()
                            .all(txn)
                            .await?;
                        for other in existing {
                            if windows_overlap(
                                other.effective_from,
                                other.effective_until,
                                input.effective_from,
                                input.effective_until,
                            ) {
                                return Err(ServiceError::PolicyOverlap(other.id));
                            }
                        }
                    }

                    let model = storage_pricing_policy::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(input.tenant_id),
                        warehouse_id: Set(input.warehouse_id),
                        free_days: Set(input.free_days),
                        daily_rate: Set(input.daily_rate),
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

        info!(policy_id = %policy.id, "created storage pricing policy");
        let _ = self
            .event_sender
            .send(Event::StoragePolicyCreated(policy.id))
            .await;
        Ok(policy)
    }

    /// The active policy whose effective window contains the whole range.
    /// Newest effective-from wins if the write-time guard was ever bypassed.
    pub async fn effective_policy(
        &self,
        warehouse_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<storage_pricing_policy::Model, ServiceError> {
        Self::effective_policy_on(&*self.db, warehouse_id, from, to)
            .await?
            .ok_or(ServiceError::PolicyNotFound { from, until: to })
    }

    async fn effective_policy_on<C: sea_orm::ConnectionTrait>(
        conn: &C,
        warehouse_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<storage_pricing_policy::Model>, ServiceError> {
        Ok(PolicyEntity::find()
            .filter(storage_pricing_policy::Column::WarehouseId.eq(warehouse_id))
            .filter(storage_pricing_policy::Column::IsActive.eq(true))
            .filter(storage_pricing_policy::Column::EffectiveFrom.lte(from))
            .filter(
                sea_orm::Condition::any()
                    .add(storage_pricing_policy::Column::EffectiveUntil.is_null())
                    .add(storage_pricing_policy::Column::EffectiveUntil.gte(to)),
            )
            .order_by_desc(storage_pricing_policy::Column::EffectiveFrom)
            .one(conn)
            .await?)
    }

    /// Computes and persists the storage charge for `[from, to)`.
    ///
    /// The range must start after the package's latest billed day; a re-run
    /// over a billed range is a conflict, not a silent double bill.
    #[instrument(skip(self))]
    pub async fn calculate_charge(
        &self,
        package_id: Uuid,
        warehouse_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<storage_charge::Model, ServiceError> {
        let total_days = (to - from).num_days();
        if total_days <= 0 {
            return Err(ServiceError::InvalidRange(format!(
                "charge range {from} to {to} spans no days"
            )));
        }

        let package = PackageEntity::find_by_id(package_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {package_id} not found")))?;

        warehouse::Entity::find_by_id(warehouse_id)
            .filter(warehouse::Column::TenantId.eq(package.tenant_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {warehouse_id} not found"))
            })?;

        let charge = self
            .db
            .transaction::<_, storage_charge::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    Self::guard_not_billed(txn, package_id, from).await?;

                    let policy =
                        Self::effective_policy_on(txn, warehouse_id, from, to)
                            .await?
                            .ok_or(ServiceError::PolicyNotFound { from, until: to })?;

                    let (free_days_applied, chargeable_days) =
                        day_split(total_days, policy.free_days);

                    let daily_premium = Self::active_premium(txn, package_id).await?;

                    let base_fee = Decimal::from(chargeable_days) * policy.daily_rate;
                    let bin_fee = Decimal::from(chargeable_days) * daily_premium;
                    let total_amount = base_fee + bin_fee;

                    let notes = format!(
                        "Storage {from} to {to}: {total_days} day(s) total, \
                         {free_days_applied} free, {chargeable_days} chargeable"
                    );

                    let model = storage_charge::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        package_id: Set(package_id),
                        warehouse_id: Set(warehouse_id),
                        charge_from: Set(from),
                        charge_to: Set(to),
                        total_days: Set(total_days as i32),
                        free_days_applied: Set(free_days_applied),
                        chargeable_days: Set(chargeable_days),
                        base_fee: Set(base_fee),
                        bin_fee: Set(bin_fee),
                        total_amount: Set(total_amount),
                        currency: Set(policy.currency.clone()),
                        notes: Set(notes),
                        is_invoiced: Set(false),
                        invoice_id: Set(None),
                        created_at: Set(Utc::now()),
                    };
                    Ok(model.insert(txn).await?)
                })
            })
            .await?;

        info!(
            charge_id = %charge.id,
            %package_id,
            total = %charge.total_amount,
            "recorded storage charge"
        );
        let _ = self
            .event_sender
            .send(Event::StorageChargeRecorded {
                charge_id: charge.id,
                package_id,
                charge_from: from,
                charge_to: to,
            })
            .await;
        Ok(charge)
    }

    /// The package row is the lock anchor: a package with no charges yet has
    /// no charge row to lock, and two first-time billings must not both pass.
    async fn guard_not_billed(
        txn: &DatabaseTransaction,
        package_id: Uuid,
        from: NaiveDate,
    ) -> Result<(), ServiceError> {
        PackageEntity::find_by_id(package_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {package_id} not found")))?;

        let latest = ChargeEntity::find()
            .filter(storage_charge::Column::PackageId.eq(package_id))
            .order_by_desc(storage_charge::Column::ChargeTo)
            .lock_exclusive()
            .one(txn)
            .await?;

        if let Some(prior) = latest {
            if from < prior.charge_to {
                return Err(ServiceError::Conflict(format!(
                    "Package {package_id} is already billed through {} by charge {}",
                    prior.charge_to, prior.id
                )));
            }
        }
        Ok(())
    }

    /// Daily premium of the package's currently active bin, zero when the
    /// package is not in a bin.
    async fn active_premium(
        txn: &DatabaseTransaction,
        package_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let assignment = AssignmentEntity::find()
            .filter(package_bin_assignment::Column::PackageId.eq(package_id))
            .filter(package_bin_assignment::Column::RemovedAt.is_null())
            .one(txn)
            .await?;

        let Some(assignment) = assignment else {
            return Ok(Decimal::ZERO);
        };

        let bin = bin_location::Entity::find_by_id(assignment.bin_location_id)
            .one(txn)
            .await?;
        Ok(bin.map(|b| b.daily_premium).unwrap_or(Decimal::ZERO))
    }

    /// All charges for a package, newest range first.
    #[instrument(skip(self))]
    pub async fn list_charges(
        &self,
        package_id: Uuid,
    ) -> Result<Vec<storage_charge::Model>, ServiceError> {
        Ok(ChargeEntity::find()
            .filter(storage_charge::Column::PackageId.eq(package_id))
            .order_by_desc(storage_charge::Column::ChargeTo)
            .all(&*self.db)
            .await?)
    }

    /// Flags charges as invoiced. Already-invoiced rows are left untouched;
    /// returns the number of rows claimed.
    #[instrument(skip(self, charge_ids))]
    pub async fn mark_invoiced(
        &self,
        charge_ids: Vec<Uuid>,
        invoice_id: Uuid,
    ) -> Result<u64, ServiceError> {
        if charge_ids.is_empty() {
            return Ok(0);
        }

        let result = ChargeEntity::update_many()
            .col_expr(storage_charge::Column::IsInvoiced, Expr::value(true))
            .col_expr(storage_charge::Column::InvoiceId, Expr::value(invoice_id))
            .filter(storage_charge::Column::Id.is_in(charge_ids))
            .filter(storage_charge::Column::IsInvoiced.eq(false))
            .exec(&*self.db)
            .await?;

        info!(%invoice_id, claimed = result.rows_affected, "marked storage charges invoiced");
        let _ = self
            .event_sender
            .send(Event::StorageChargesInvoiced {
                invoice_id,
                charge_count: result.rows_affected as usize,
            })
            .await;
        Ok(result.rows_affected)
    }
}
