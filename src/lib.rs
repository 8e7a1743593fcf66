pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{
    estimate_totals, reconcile_same_as_primary, submit, submit_batch, AddressFailurePolicy,
    AddressFormSession, EstimateTotals, PricingError, Reconciliation, SubmissionError, Totals,
    Validate, ValidationErrors,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use api::{ApiSettings, AppState};
use config::{AppConfig, StorageBackend};

/// Build the router for the configured backend and serve it until shutdown
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    use std::sync::Arc;

    let settings = ApiSettings::from_config(&config);

    let app: axum::Router = match config.database.backend {
        StorageBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;

            routes::create_router()
                .with_state(AppState::new(Arc::new(store)).with_settings(settings))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on shutdown");
            routes::create_router()
                .with_state(AppState::new(Arc::new(MemoryStore::new())).with_settings(settings))
        }
    };

    let bind_address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    log::info!("Field service server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
