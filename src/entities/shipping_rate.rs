use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An effective-dated price definition scoped to (warehouse, zone, tier).
///
/// Active rates sharing a scope must never have overlapping effective
/// windows; the rate service enforces this at write time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub zone_id: Uuid,
    pub service_tier: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub base_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub per_kg_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub min_charge: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 3)))")]
    pub max_weight_kg: Option<Decimal>,
    pub currency: String,
    pub is_active: bool,
    /// Inclusive start of the effective window
    pub effective_from: NaiveDate,
    /// Inclusive end of the effective window; None = open-ended
    pub effective_until: Option<NaiveDate>,
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
    #[sea_orm(
        belongs_to = "super::shipping_zone::Entity",
        from = "Column::ZoneId",
        to = "super::shipping_zone::Column::Id"
    )]
    ShippingZone,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::shipping_zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingZone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
