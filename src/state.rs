//! Shared application state for all routes. The catalog is reloadable after writes to the control tables.

use crate::config::{load_catalog, Catalog, Settings};
use crate::error::AppError;
use sqlx::PgPool;
use std::sync::{Arc, RwLock};

/// Current catalog snapshot. Readers clone the inner `Arc`; a refresh swaps it whole.
#[derive(Clone)]
pub struct SharedCatalog(Arc<RwLock<Arc<Catalog>>>);

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        SharedCatalog(Arc::new(RwLock::new(Arc::new(catalog))))
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, catalog: Catalog) {
        let next = Arc::new(catalog);
        match self.0.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: SharedCatalog,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: PgPool, catalog: Catalog, settings: Settings) -> Self {
        AppState {
            pool,
            catalog: SharedCatalog::new(catalog),
            settings: Arc::new(settings),
        }
    }

    /// Rebuild the catalog from the store and swap it in. On failure the previous snapshot stays.
    pub async fn refresh_catalog(&self) -> Result<(), AppError> {
        let catalog = load_catalog(
            &self.pool,
            &self.settings.db_schema,
            self.settings.suppress_abstract_table_docs,
        )
        .await?;
        self.catalog.replace(catalog);
        tracing::info!("catalog refreshed");
        Ok(())
    }
}
