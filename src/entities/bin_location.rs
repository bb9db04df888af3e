use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A physical storage slot within a warehouse.
///
/// Occupancy is always derived by counting active assignments; it is never
/// stored on this row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bin_locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub code: String,
    /// Logistics zone label within the warehouse (aisle/area), unrelated to
    /// shipping zones
    pub zone_label: String,
    /// None = unlimited
    pub max_capacity: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((10, 3)))")]
    pub max_weight_kg: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub daily_premium: Decimal,
    pub currency: String,
    pub climate_controlled: bool,
    pub secured: bool,
    pub easy_access: bool,
    pub is_active: bool,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    #[sea_orm(has_many = "super::package_bin_assignment::Entity")]
    Assignments,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::package_bin_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
