use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipping_rate::Entity")]
    ShippingRates,
    #[sea_orm(has_many = "super::bin_location::Entity")]
    BinLocations,
}

impl Related<super::shipping_rate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingRates.def()
    }
}

impl Related<super::bin_location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BinLocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
