use std::net::SocketAddr;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 10)
    pub db_max_connections: u32,

    /// Upstream traffic events feed
    pub feed_url: String,

    /// Locale requested for the translated fetch (default: "en")
    pub feed_secondary_locale: String,

    /// Seconds between two feed polls (default: 360)
    pub poll_interval_secs: u64,

    /// Push provider send endpoint
    pub fcm_endpoint: String,

    /// Push provider server key
    pub fcm_server_key: String,

    /// Topic every batch is broadcast to
    pub fcm_topic: String,

    /// Page through registered devices after the topic broadcast
    pub individual_push: bool,

    /// Dry-run sends and verbose logging
    pub debug_mode: bool,

    /// Deadline for a single provider call, in seconds
    pub send_timeout_secs: u64,

    /// Address the HTTP surface listens on
    pub http_bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            feed_url: std::env::var("FEED_URL")
                .unwrap_or_else(|_| "https://opendata.si/promet/events/".to_string()),
            feed_secondary_locale: std::env::var("FEED_SECONDARY_LOCALE")
                .unwrap_or_else(|_| "en".to_string()),
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "360".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_INTERVAL_SECS must be a valid u64"))?,
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string()),
            fcm_server_key: std::env::var("FCM_SERVER_KEY")
                .map_err(|_| anyhow::anyhow!("FCM_SERVER_KEY environment variable is required"))?,
            fcm_topic: std::env::var("FCM_TOPIC").unwrap_or_else(|_| "allRoadEvents".to_string()),
            individual_push: parse_flag("INDIVIDUAL_PUSH", true)?,
            debug_mode: parse_flag("DEBUG_MODE", false)?,
            send_timeout_secs: std::env::var("SEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEND_TIMEOUT_SECS must be a valid u64"))?,
            http_bind_addr: std::env::var("HTTP_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_BIND_ADDR must be a socket address"))?,
        })
    }
}

fn parse_flag(key: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("{} must be a boolean, got '{}'", key, raw)),
        },
    }
}
