use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outbound shipment record. Created by the fulfilment side of the
/// application; the engine reads it only for referential-integrity guards
/// (a rate's zone cannot be deleted out from under a booked shipment).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub package_id: Uuid,
    pub zone_id: Uuid,
    pub service_tier: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_charge: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipping_zone::Entity",
        from = "Column::ZoneId",
        to = "super::shipping_zone::Column::Id"
    )]
    ShippingZone,
}

impl Related<super::shipping_zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingZone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
