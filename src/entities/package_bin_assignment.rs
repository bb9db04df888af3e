use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A package's current or historical occupancy of one bin.
///
/// `removed_at = None` marks the single active placement a package may hold;
/// a removed assignment is terminal and a new row is created on reassignment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_bin_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub package_id: Uuid,
    pub bin_location_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
    pub assign_reason: Option<String>,
    pub remove_reason: Option<String>,
    pub notes: Option<String>,
    pub assigned_by: Uuid,
    pub removed_by: Option<Uuid>,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
    #[sea_orm(
        belongs_to = "super::bin_location::Entity",
        from = "Column::BinLocationId",
        to = "super::bin_location::Column::Id"
    )]
    BinLocation,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl Related<super::bin_location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BinLocation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
