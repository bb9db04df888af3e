pub mod bins;
pub mod quotes;
pub mod rates;
pub mod storage;
pub mod zones;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer wired up once and shared by every HTTP handler.
#[derive(Clone)]
pub struct AppServices {
    pub zones: Arc<crate::services::zones::ZoneService>,
    pub rates: Arc<crate::services::rates::RateService>,
    pub quotes: Arc<crate::services::quotes::QuoteService>,
    pub storage: Arc<crate::services::storage::StorageService>,
    pub bins: Arc<crate::services::bins::BinService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        let zones = crate::services::zones::ZoneService::new(db_pool.clone());
        let rates =
            crate::services::rates::RateService::new(db_pool.clone(), event_sender.clone());
        let quotes = crate::services::quotes::QuoteService::new(
            db_pool.clone(),
            zones.clone(),
            rates.clone(),
        );
        let storage =
            crate::services::storage::StorageService::new(db_pool.clone(), event_sender.clone());
        let bins = crate::services::bins::BinService::new(db_pool, event_sender);

        Self {
            zones: Arc::new(zones),
            rates: Arc::new(rates),
            quotes: Arc::new(quotes),
            storage: Arc::new(storage),
            bins: Arc::new(bins),
        }
    }
}
