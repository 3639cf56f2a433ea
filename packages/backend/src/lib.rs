pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;
pub mod workers;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::RedisCache;
use crate::config::Config;
use crate::db::{Database, DbInitError};
use crate::state::AppState;

/// Full HTTP application with tracing and CORS layers.
pub fn build_router(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Connects and migrates the database, seeds reference data and attaches
/// Redis when configured. A Redis outage only disables caching.
pub async fn init_state(config: Config) -> Result<AppState, DbInitError> {
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let cache = match config.redis_url.as_deref() {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("redis cache connected");
                Some(Arc::new(cache))
            }
            Err(err) => {
                tracing::warn!(error = %err, "redis unavailable, caching disabled");
                None
            }
        },
        None => None,
    };

    seed::seed_achievements(&db, cache.as_deref()).await?;
    if config.seed_sample_data {
        seed::seed_sample_words(&db).await?;
    }

    Ok(AppState::new(config, db, cache))
}
