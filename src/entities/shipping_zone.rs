use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tenant-scoped grouping of destination countries sharing rate tiers.
///
/// A country may belong to any number of zones; ambiguity is resolved by the
/// rate calculator, not here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_zones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// JSON array of two-letter ISO country codes
    pub countries: Json,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Returns true if `country_code` is a member of this zone.
    /// Comparison is case-insensitive on the stored codes.
    pub fn contains_country(&self, country_code: &str) -> bool {
        self.countries
            .as_array()
            .map(|codes| {
                codes.iter().any(|c| {
                    c.as_str()
                        .map(|s| s.eq_ignore_ascii_case(country_code))
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    pub fn member_countries(&self) -> Vec<String> {
        self.countries
            .as_array()
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipping_rate::Entity")]
    ShippingRates,
}

impl Related<super::shipping_rate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingRates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
