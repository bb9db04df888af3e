//! Bin capacity tracking.
//!
//! A package holds at most one active assignment, and a bin with a finite
//! capacity never holds more active assignments than that capacity.
//! Occupancy is derived by counting active assignment rows inside the same
//! transaction as the capacity check; it is never a stored counter. The bin
//! row is locked for the duration of the check-and-insert so two assigns
//! racing for the last slot serialize.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::bin_location::{self, Entity as BinEntity};
use crate::entities::package::Entity as PackageEntity;
use crate::entities::package_bin_assignment::{self, Entity as AssignmentEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// An active+available bin with derived occupancy figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinAvailability {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub code: String,
    pub zone_label: String,
    pub daily_premium: Decimal,
    pub currency: String,
    pub climate_controlled: bool,
    pub secured: bool,
    pub easy_access: bool,
    pub max_capacity: Option<i32>,
    pub current_count: i64,
    /// None when the bin is unlimited
    pub available_capacity: Option<i64>,
    /// None when the bin is unlimited
    pub utilization_percent: Option<f64>,
}

#[derive(Clone)]
pub struct BinService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl BinService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    async fn active_count(
        txn: &DatabaseTransaction,
        bin_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(AssignmentEntity::find()
            .filter(package_bin_assignment::Column::BinLocationId.eq(bin_id))
            .filter(package_bin_assignment::Column::RemovedAt.is_null())
            .count(txn)
            .await?)
    }

    /// Places a package into a bin.
    ///
    /// Fails when either side is missing, the bin is inactive or
    /// unavailable, the package is already placed somewhere, or the bin is
    /// at capacity.
    #[instrument(skip(self, reason))]
    pub async fn assign(
        &self,
        package_id: Uuid,
        bin_id: Uuid,
        reason: Option<String>,
        actor: Uuid,
    ) -> Result<package_bin_assignment::Model, ServiceError> {
        let assignment = self
            .db
            .transaction::<_, package_bin_assignment::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let package = PackageEntity::find_by_id(package_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Package {package_id} not found"))
                        })?;

                    // Lock the bin row: the capacity check below must not
                    // race another assign to the same bin.
                    let bin = BinEntity::find_by_id(bin_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Bin {bin_id} not found"))
                        })?;

                    if !bin.is_active || !bin.is_available {
                        return Err(ServiceError::BinUnavailable(format!(
                            "Bin {} is not accepting packages",
                            bin.code
                        )));
                    }

                    if let Some(max_weight) = bin.max_weight_kg {
                        if package.weight_kg > max_weight {
                            return Err(ServiceError::BinUnavailable(format!(
                                "Package {} exceeds bin {} weight limit of {max_weight} kg",
                                package.tracking_number, bin.code
                            )));
                        }
                    }

                    let existing = AssignmentEntity::find()
                        .filter(package_bin_assignment::Column::PackageId.eq(package_id))
                        .filter(package_bin_assignment::Column::RemovedAt.is_null())
                        .count(txn)
                        .await?;
                    if existing > 0 {
                        return Err(ServiceError::AlreadyAssigned(package_id));
                    }

                    if let Some(capacity) = bin.max_capacity {
                        let occupied = Self::active_count(txn, bin_id).await?;
                        if occupied >= capacity as u64 {
                            return Err(ServiceError::CapacityExceeded {
                                bin_id,
                                capacity,
                            });
                        }
                    }

                    let model = package_bin_assignment::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        package_id: Set(package_id),
                        bin_location_id: Set(bin_id),
                        assigned_at: Set(Utc::now()),
                        removed_at: Set(None),
                        assign_reason: Set(reason),
                        remove_reason: Set(None),
                        notes: Set(None),
                        assigned_by: Set(actor),
                        removed_by: Set(None),
                    };
                    Ok(model.insert(txn).await?)
                })
            })
            .await?;

        info!(assignment_id = %assignment.id, %package_id, %bin_id, "assigned package to bin");
        let _ = self
            .event_sender
            .send(Event::PackageAssignedToBin {
                assignment_id: assignment.id,
                package_id,
                bin_location_id: bin_id,
            })
            .await;
        Ok(assignment)
    }

    /// Ends a package's active assignment. Returns false when the package
    /// has none. The only way occupancy ever decreases.
    #[instrument(skip(self, reason))]
    pub async fn remove_by_package(
        &self,
        package_id: Uuid,
        reason: Option<String>,
        actor: Uuid,
    ) -> Result<bool, ServiceError> {
        let active = AssignmentEntity::find()
            .filter(package_bin_assignment::Column::PackageId.eq(package_id))
            .filter(package_bin_assignment::Column::RemovedAt.is_null())
            .one(&*self.db)
            .await?;

        match active {
            Some(assignment) => self.finish_assignment(assignment, reason, actor).await,
            None => Ok(false),
        }
    }

    /// Ends a specific assignment. Returns false when it is already removed
    /// or does not exist.
    #[instrument(skip(self, reason))]
    pub async fn remove_assignment(
        &self,
        assignment_id: Uuid,
        reason: Option<String>,
        actor: Uuid,
    ) -> Result<bool, ServiceError> {
        let assignment = AssignmentEntity::find_by_id(assignment_id)
            .one(&*self.db)
            .await?;

        match assignment {
            Some(a) if a.is_active() => self.finish_assignment(a, reason, actor).await,
            _ => Ok(false),
        }
    }

    /// Stamps the removal, guarded on `removed_at IS NULL` so two racing
    /// removes of the same assignment cannot both claim the win. Returns
    /// false when another caller got there first.
    async fn finish_assignment(
        &self,
        assignment: package_bin_assignment::Model,
        reason: Option<String>,
        actor: Uuid,
    ) -> Result<bool, ServiceError> {
        let assignment_id = assignment.id;
        let package_id = assignment.package_id;
        let bin_id = assignment.bin_location_id;

        let result = AssignmentEntity::update_many()
            .col_expr(
                package_bin_assignment::Column::RemovedAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(
                package_bin_assignment::Column::RemoveReason,
                Expr::value(reason),
            )
            .col_expr(
                package_bin_assignment::Column::RemovedBy,
                Expr::value(Some(actor)),
            )
            .filter(package_bin_assignment::Column::Id.eq(assignment_id))
            .filter(package_bin_assignment::Column::RemovedAt.is_null())
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(false);
        }

        info!(%assignment_id, %package_id, %bin_id, "removed package from bin");
        let _ = self
            .event_sender
            .send(Event::PackageRemovedFromBin {
                assignment_id,
                package_id,
                bin_location_id: bin_id,
            })
            .await;
        Ok(true)
    }

    /// The package's active assignment, if any.
    #[instrument(skip(self))]
    pub async fn active_assignment(
        &self,
        package_id: Uuid,
    ) -> Result<Option<package_bin_assignment::Model>, ServiceError> {
        Ok(AssignmentEntity::find()
            .filter(package_bin_assignment::Column::PackageId.eq(package_id))
            .filter(package_bin_assignment::Column::RemovedAt.is_null())
            .one(&*self.db)
            .await?)
    }

    /// Full Assigned/Removed history for a package, newest first.
    #[instrument(skip(self))]
    pub async fn assignment_history(
        &self,
        package_id: Uuid,
    ) -> Result<Vec<package_bin_assignment::Model>, ServiceError> {
        PackageEntity::find_by_id(package_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {package_id} not found")))?;

        Ok(AssignmentEntity::find()
            .filter(package_bin_assignment::Column::PackageId.eq(package_id))
            .order_by_desc(package_bin_assignment::Column::AssignedAt)
            .all(&*self.db)
            .await?)
    }

    /// Active+available bins of a warehouse with derived occupancy, bins
    /// already at capacity filtered out.
    #[instrument(skip(self))]
    pub async fn get_available_bins(
        &self,
        warehouse_id: Uuid,
    ) -> Result<Vec<BinAvailability>, ServiceError> {
        let bins = BinEntity::find()
            .filter(bin_location::Column::WarehouseId.eq(warehouse_id))
            .filter(bin_location::Column::IsActive.eq(true))
            .filter(bin_location::Column::IsAvailable.eq(true))
            .order_by_asc(bin_location::Column::Code)
            .all(&*self.db)
            .await?;

        let mut available = Vec::with_capacity(bins.len());
        for bin in bins {
            let count = AssignmentEntity::find()
                .filter(package_bin_assignment::Column::BinLocationId.eq(bin.id))
                .filter(package_bin_assignment::Column::RemovedAt.is_null())
                .count(&*self.db)
                .await? as i64;

            match bin.max_capacity {
                Some(capacity) if count >= capacity as i64 => continue,
                _ => {}
            }

            available.push(BinAvailability {
                id: bin.id,
                warehouse_id: bin.warehouse_id,
                code: bin.code,
                zone_label: bin.zone_label,
                daily_premium: bin.daily_premium,
                currency: bin.currency,
                climate_controlled: bin.climate_controlled,
                secured: bin.secured,
                easy_access: bin.easy_access,
                max_capacity: bin.max_capacity,
                current_count: count,
                available_capacity: bin.max_capacity.map(|c| c as i64 - count),
                utilization_percent: bin
                    .max_capacity
                    .map(|c| (count as f64 / c as f64) * 100.0),
            });
        }
        Ok(available)
    }
}
