use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::enrichment::LeadEnricher;
use crate::services::store::BookingStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<BookingStore>,
    pub enricher: LeadEnricher,
}

impl AppState {
    /// Stops background analysis and makes late results inert.
    pub fn shutdown(&self) {
        self.store.close();
        self.enricher.shutdown();
    }
}
