//! Forwarder API Library
//!
//! Pricing and capacity engine for a package-forwarding warehouse platform:
//! shipping-zone resolution, effective-dated rate management with overlap
//! protection, quote calculation, storage billing, and bin capacity
//! tracking. The services are the public surface; the HTTP layer is a thin
//! translation over them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;

use axum::{response::Json, routing::{delete, get, post, put}, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common response wrapper.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Common query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        // Zones
        .route("/zones", post(handlers::zones::create_zone))
        .route("/zones/resolve", get(handlers::zones::resolve_zones))
        .route("/zones/:id", get(handlers::zones::get_zone))
        .route("/zones/:id", delete(handlers::zones::delete_zone))
        // Rates
        .route("/rates", get(handlers::rates::list_rates))
        .route("/rates", post(handlers::rates::create_rate))
        .route("/rates/:id", get(handlers::rates::get_rate))
        .route("/rates/:id", put(handlers::rates::update_rate))
        .route("/rates/:id", delete(handlers::rates::delete_rate))
        // Quotes
        .route("/quotes/calculate", post(handlers::quotes::calculate_quotes))
        // Storage billing
        .route("/storage/policies", post(handlers::storage::create_policy))
        .route("/storage/charges", post(handlers::storage::calculate_charge))
        .route(
            "/storage/charges/mark-invoiced",
            post(handlers::storage::mark_invoiced),
        )
        .route(
            "/packages/:id/storage-charges",
            get(handlers::storage::list_charges),
        )
        // Bin capacity
        .route("/bins/assign", post(handlers::bins::assign_package))
        .route("/packages/:id/bin", delete(handlers::bins::remove_package))
        .route(
            "/packages/:id/bin-history",
            get(handlers::bins::assignment_history),
        )
        .route(
            "/warehouses/:id/available-bins",
            get(handlers::bins::available_bins),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_carries_data() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
