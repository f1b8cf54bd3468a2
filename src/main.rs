use std::sync::Arc;
use std::time::Duration;

use crayon_api::config::Config;
use crayon_api::db;
use crayon_api::routes::{create_router, AppState};
use crayon_api::services::recommendation::{RecommendationService, ThreadRngJitter};
use crayon_api::services::store::{
    CatalogStore, InteractionLog, PgCatalogStore, PgInteractionLog, PgUserStore, UserStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crayon_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let redis_client = db::create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = db::Cache::new(redis_client).await;

    let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
    let interactions: Arc<dyn InteractionLog> = Arc::new(PgInteractionLog::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));

    let recommender = Arc::new(RecommendationService::new(
        Arc::clone(&catalog),
        interactions,
        users,
        Some(cache.clone()),
        Arc::new(ThreadRngJitter),
        Duration::from_millis(config.generator_timeout_ms),
    ));

    let state = AppState {
        recommender,
        catalog,
        cache: Some(cache),
    };
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush pending cache writes before exiting
    cache_writer.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
    }
}
