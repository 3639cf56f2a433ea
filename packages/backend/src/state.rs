use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::auth::AuthConfig;
use crate::cache::RedisCache;
use crate::config::Config;
use crate::db::Database;
use crate::services::quiz::UserLocks;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    auth: Arc<AuthConfig>,
    db: Database,
    cache: Option<Arc<RedisCache>>,
    user_locks: Arc<UserLocks>,
}

impl AppState {
    pub fn new(config: Config, db: Database, cache: Option<Arc<RedisCache>>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            auth: Arc::new(AuthConfig::from_config(&config)),
            config: Arc::new(config),
            db,
            cache,
            user_locks: Arc::new(UserLocks::default()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> Option<&RedisCache> {
        self.cache.as_deref()
    }

    pub fn user_locks(&self) -> &UserLocks {
        &self.user_locks
    }
}
