use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use matchmovies_api::config::Config;
use matchmovies_api::db::{create_pool, PgStore};
use matchmovies_api::routes::{create_router, AppState};
use matchmovies_api::services::providers::TmdbCatalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let catalog = TmdbCatalog::new(
        redis_client,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.tmdb_language.clone(),
        Duration::from_secs(config.tmdb_timeout_secs),
    )?;

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        catalog: Arc::new(catalog),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
