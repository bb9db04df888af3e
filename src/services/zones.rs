//! Zone resolution and zone lifecycle guards.
//!
//! Resolution maps a destination country to every active zone whose member
//! set contains it. Zero matches is a valid outcome and multiple matches are
//! legal; precedence between overlapping zones is the quote calculator's
//! concern.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::shipping_rate;
use crate::entities::shipping_zone::{self, Entity as ZoneEntity};
use crate::errors::ServiceError;

/// Input for creating a zone.
#[derive(Debug, Clone)]
pub struct NewZone {
    pub tenant_id: Uuid,
    pub name: String,
    pub countries: Vec<String>,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct ZoneService {
    db: Arc<DatabaseConnection>,
}

impl ZoneService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns every active zone of the tenant whose country set contains
    /// `country_code`. Pure lookup, no precedence applied.
    #[instrument(skip(self))]
    pub async fn resolve_zones(
        &self,
        tenant_id: Uuid,
        country_code: &str,
    ) -> Result<Vec<shipping_zone::Model>, ServiceError> {
        let code = country_code.trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::ValidationError(format!(
                "'{country_code}' is not a two-letter country code"
            )));
        }

        // Membership lives in a JSON column, so the candidate set is
        // narrowed in SQL to the tenant's active zones and the membership
        // test runs on the fetched rows.
        let zones = ZoneEntity::find()
            .filter(shipping_zone::Column::TenantId.eq(tenant_id))
            .filter(shipping_zone::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;

        Ok(zones
            .into_iter()
            .filter(|z| z.contains_country(code))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_zone(&self, id: Uuid) -> Result<shipping_zone::Model, ServiceError> {
        ZoneEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Zone {id} not found")))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_zone(&self, input: NewZone) -> Result<shipping_zone::Model, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Zone name must not be empty".to_string(),
            ));
        }
        let mut codes = Vec::with_capacity(input.countries.len());
        for code in &input.countries {
            let code = code.trim().to_ascii_uppercase();
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ServiceError::ValidationError(format!(
                    "'{code}' is not a two-letter country code"
                )));
            }
            codes.push(code);
        }

        let model = shipping_zone::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(input.tenant_id),
            name: Set(input.name),
            countries: Set(json!(codes)),
            is_active: Set(input.is_active),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let zone = model.insert(&*self.db).await?;
        info!(zone_id = %zone.id, "created shipping zone");
        Ok(zone)
    }

    /// Deletes a zone. Refused while any active rate still references it.
    #[instrument(skip(self))]
    pub async fn delete_zone(&self, id: Uuid) -> Result<(), ServiceError> {
        let zone = self.get_zone(id).await?;

        let active_rates = shipping_rate::Entity::find()
            .filter(shipping_rate::Column::ZoneId.eq(id))
            .filter(shipping_rate::Column::IsActive.eq(true))
            .count(&*self.db)
            .await?;
        if active_rates > 0 {
            return Err(ServiceError::InUse(format!(
                "Zone {id} is referenced by {active_rates} active rate(s)"
            )));
        }

        zone.delete(&*self.db).await?;
        info!(zone_id = %id, "deleted shipping zone");
        Ok(())
    }
}
