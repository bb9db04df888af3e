//! Shared harness: application state backed by an in-memory SQLite
//! database, plus seed helpers for the rows the engine only reads.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use forwarder_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{bin_location, package, shipment, warehouse},
    events,
    handlers::AppServices,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub state: AppState,
    pub tenant_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh in-memory database with the full schema and service stack.
    pub async fn new() -> Self {
        // A single connection keeps every handle on the same in-memory
        // database and serializes transactions the way a row lock would.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");

        db::ensure_schema(&pool)
            .await
            .expect("failed to create schema");

        let db = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db.clone(), event_sender.clone());
        let state = AppState {
            db: db.clone(),
            config: AppConfig::new(
                "sqlite::memory:".to_string(),
                "127.0.0.1".to_string(),
                0,
                "test".to_string(),
            ),
            event_sender,
            services,
        };

        Self {
            db,
            state,
            tenant_id: Uuid::new_v4(),
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub async fn seed_warehouse(&self) -> warehouse::Model {
        warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            name: Set("Main warehouse".to_string()),
            code: Set(format!("WH-{}", &Uuid::new_v4().to_string()[..8])),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed warehouse")
    }

    pub async fn seed_package(
        &self,
        warehouse_id: Uuid,
        weight_kg: Decimal,
    ) -> package::Model {
        package::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            warehouse_id: Set(warehouse_id),
            tracking_number: Set(format!("TRK{}", &Uuid::new_v4().simple().to_string()[..10])),
            status: Set("received".to_string()),
            weight_kg: Set(weight_kg),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed package")
    }

    pub async fn seed_bin(
        &self,
        warehouse_id: Uuid,
        code: &str,
        max_capacity: Option<i32>,
        daily_premium: Decimal,
    ) -> bin_location::Model {
        bin_location::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            code: Set(code.to_string()),
            zone_label: Set("A".to_string()),
            max_capacity: Set(max_capacity),
            max_weight_kg: Set(None),
            daily_premium: Set(daily_premium),
            currency: Set("USD".to_string()),
            climate_controlled: Set(false),
            secured: Set(false),
            easy_access: Set(true),
            is_active: Set(true),
            is_available: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed bin")
    }

    pub async fn seed_shipment(&self, package_id: Uuid, zone_id: Uuid) -> shipment::Model {
        shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            package_id: Set(package_id),
            zone_id: Set(zone_id),
            service_tier: Set("standard".to_string()),
            total_charge: Set(Decimal::new(2500, 2)),
            currency: Set("USD".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed shipment")
    }
}
