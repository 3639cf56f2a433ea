use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/vocabtamil.db?mode=rwc";
pub const DEFAULT_LEADERBOARD_SCHEDULE: &str = "0 0 * * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: String,
    pub seed_sample_data: bool,
    pub worker_leader: bool,
    pub leaderboard_snapshot_schedule: String,
    pub app_env: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            host,
            port,
            log_level,
            database_url: env_non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env_non_empty("REDIS_URL"),
            jwt_secret: env_non_empty("JWT_SECRET"),
            jwt_expires_in: env_non_empty("JWT_EXPIRES_IN").unwrap_or_else(|| "24h".to_string()),
            seed_sample_data: env_flag("SEED_SAMPLE_DATA"),
            worker_leader: env_flag("WORKER_LEADER"),
            leaderboard_snapshot_schedule: env_non_empty("LEADERBOARD_SNAPSHOT_SCHEDULE")
                .unwrap_or_else(|| DEFAULT_LEADERBOARD_SCHEDULE.to_string()),
            app_env: env_non_empty("APP_ENV").unwrap_or_else(|| "development".to_string()),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_test(&self) -> bool {
        self.app_env == "test"
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
