pub mod keys;

use std::time::Duration;

use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

const TTL_JITTER_RATIO: f64 = 0.1;

/// JSON-valued Redis cache. Every failure degrades to a cache miss.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { connection })
    }

    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(key).await.ok()?;
        payload.and_then(|p| serde_json::from_str(&p).ok())
    }

    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize,
    {
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.connection.clone();

        if ttl.is_zero() {
            let _: Result<(), _> = conn.set(key, payload).await;
        } else {
            let ttl_secs = apply_ttl_jitter(ttl).as_secs().max(1);
            let _: Result<(), _> = conn.set_ex(key, payload, ttl_secs).await;
        }
    }

    pub async fn delete(&self, key: &str) {
        let mut conn = self.connection.clone();
        let _: Result<u64, _> = conn.del(key).await;
    }

    /// Removes every key matching a glob pattern.
    pub async fn delete_pattern(&self, pattern: &str) {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = match redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await
        {
            Ok(keys) => keys,
            Err(err) => {
                tracing::debug!(error = %err, pattern, "cache pattern lookup failed");
                return;
            }
        };
        if !keys.is_empty() {
            let _: Result<u64, _> = conn.del(keys).await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

fn apply_ttl_jitter(ttl: Duration) -> Duration {
    let base_ms = ttl.as_millis() as f64;
    let factor = rand::rng().random_range(1.0 - TTL_JITTER_RATIO..=1.0 + TTL_JITTER_RATIO);
    Duration::from_millis((base_ms * factor).round().max(1.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_ratio() {
        let ttl = Duration::from_secs(60);
        for _ in 0..100 {
            let jittered = apply_ttl_jitter(ttl).as_millis();
            assert!((54_000..=66_000).contains(&jittered));
        }
    }
}
