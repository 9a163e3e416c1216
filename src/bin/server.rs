//! Server binary: settings from the environment (and `.env`), catalog from the store, then serve.

use generic_data_api::{app, load_catalog, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    let default_filter = if settings.debug {
        "generic_data_api=debug,tower_http=debug"
    } else {
        "generic_data_api=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    // A catalog that cannot be built is fatal.
    let catalog = load_catalog(&pool, &settings.db_schema, settings.suppress_abstract_table_docs).await?;
    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(pool, catalog, settings);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
