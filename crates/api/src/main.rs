use std::sync::Arc;

use anyhow::Result;
use domain::store::InMemoryStore;
use tracing::{info, warn};

use survey_rewards_api::app;
use survey_rewards_api::config::{Config, StoreBackend};
use survey_rewards_api::middleware;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting Survey Rewards API v{}", env!("CARGO_PKG_VERSION"));

    let app = match config.allocation.store {
        StoreBackend::Postgres => {
            let db_config = persistence::db::DatabaseConfig::from(&config.database);
            let pool = persistence::db::create_pool(&db_config).await?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            app::create_app(config.clone(), pool)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; state is lost on restart");
            app::create_app_with_store(config.clone(), Arc::new(InMemoryStore::new()), None)
        }
    };

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
