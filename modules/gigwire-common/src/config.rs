use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Scheduler
    pub enable_scheduler: bool,
    /// UTC hour at which the daily ingest job runs.
    pub ingest_hour_utc: u32,
    pub publish_interval_minutes: u64,
    pub publish_batch_size: i64,

    // Audit policy
    pub audit_horizon_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            enable_scheduler: env::var("ENABLE_SCHEDULER")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            ingest_hour_utc: env::var("INGEST_HOUR_UTC")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .expect("INGEST_HOUR_UTC must be an hour (0-23)"),
            publish_interval_minutes: env::var("PUBLISH_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("PUBLISH_INTERVAL_MINUTES must be a number"),
            publish_batch_size: env::var("PUBLISH_BATCH_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .expect("PUBLISH_BATCH_SIZE must be a number"),
            audit_horizon_days: env::var("AUDIT_HORIZON_DAYS")
                .unwrap_or_else(|_| "180".to_string())
                .parse()
                .expect("AUDIT_HORIZON_DAYS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
