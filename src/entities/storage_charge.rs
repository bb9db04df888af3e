use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable computed storage billing record. Only the invoicing flag is
/// ever mutated after insert, when the invoicing subsystem claims the row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_charges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub package_id: Uuid,
    pub warehouse_id: Uuid,
    pub charge_from: NaiveDate,
    pub charge_to: NaiveDate,
    pub total_days: i32,
    pub free_days_applied: i32,
    pub chargeable_days: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub base_fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub bin_fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    pub currency: String,
    /// Human-readable computation summary kept for audit
    pub notes: String,
    pub is_invoiced: bool,
    pub invoice_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
