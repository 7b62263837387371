use std::env;
use std::time::Duration;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub opnsense_url: String,
    pub opnsense_key: String,
    pub opnsense_secret: String,
    pub opnsense_verify_tls: bool,
    pub opnsense_timeout_secs: u64,
    pub redis_url: String,
    pub device_scan_interval_secs: u64,
    pub interface_scan_interval_secs: u64,
    pub device_cache_ttl_secs: u64,
    pub interface_cache_ttl_secs: u64,
    pub scan_concurrency: usize,
    pub device_down_grace_secs: u64,
    pub interface_refresh_cooldown_secs: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "/data/lanwatch.db"),
            db_max_connections: get_parsed("DB_MAX_CONNECTIONS", 5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            opnsense_url: get_env("OPNSENSE_URL", "https://192.168.1.1"),
            opnsense_key: get_env("OPNSENSE_KEY", ""),
            opnsense_secret: get_env("OPNSENSE_SECRET", ""),
            opnsense_verify_tls: get_parsed("OPNSENSE_VERIFY_TLS", false),
            opnsense_timeout_secs: get_parsed("OPNSENSE_TIMEOUT_SECS", 10),
            redis_url: get_env("REDIS_URL", ""),
            device_scan_interval_secs: get_parsed("DEVICE_SCAN_INTERVAL_SECS", 60),
            interface_scan_interval_secs: get_parsed("INTERFACE_SCAN_INTERVAL_SECS", 3600),
            device_cache_ttl_secs: get_parsed("DEVICE_CACHE_TTL_SECS", 60),
            interface_cache_ttl_secs: get_parsed("INTERFACE_CACHE_TTL_SECS", 3600),
            scan_concurrency: get_parsed("SCAN_CONCURRENCY", 16),
            device_down_grace_secs: get_parsed("DEVICE_DOWN_GRACE_SECS", 0),
            interface_refresh_cooldown_secs: get_parsed("INTERFACE_REFRESH_COOLDOWN_SECS", 300),
        }
    }

    pub fn device_scan_interval(&self) -> Duration {
        Duration::from_secs(self.device_scan_interval_secs.max(1))
    }

    pub fn interface_scan_interval(&self) -> Duration {
        Duration::from_secs(self.interface_scan_interval_secs.max(1))
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an env var, falling back to the default when unset or malformed
fn get_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
