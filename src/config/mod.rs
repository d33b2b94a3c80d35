use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub recalc: RecalcConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:leafy.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services such as MinIO
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Base URL that uploaded images are served from.
    /// Defaults to the bucket's virtual-hosted S3 URL.
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3-{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_bucket() -> String {
    "leafy-images".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a session token in hours (default: 24)
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Lifetime of a refresh token in days (default: 60)
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
    /// Argon2 memory cost in KiB
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    /// Argon2 iteration count
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    /// Argon2 degree of parallelism
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            refresh_ttl_days: default_refresh_ttl_days(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_refresh_ttl_days() -> i64 {
    60
}

fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

fn default_hash_iterations() -> u32 {
    2
}

fn default_hash_parallelism() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecalcConfig {
    #[serde(default = "default_recalc_enabled")]
    pub enabled: bool,
    /// Minutes between elapsed-time sweeps (default: 60)
    #[serde(default = "default_recalc_interval_minutes")]
    pub interval_minutes: u64,
    /// Stop `time_elapsed` from growing past `watering_time`
    #[serde(default)]
    pub cap_at_watering_time: bool,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        Self {
            enabled: default_recalc_enabled(),
            interval_minutes: default_recalc_interval_minutes(),
            cap_at_watering_time: false,
        }
    }
}

fn default_recalc_enabled() -> bool {
    true
}

fn default_recalc_interval_minutes() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One year
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
/// Ten years
const MAX_REFRESH_TTL_DAYS: i64 = 365 * 10;
/// One week
const MAX_RECALC_INTERVAL_MINUTES: u64 = 60 * 24 * 7;

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.auth.session_ttl_hours) {
            bail!("auth.session_ttl_hours must be between 1 and {}", MAX_SESSION_TTL_HOURS);
        }
        if !(1..=MAX_REFRESH_TTL_DAYS).contains(&self.auth.refresh_ttl_days) {
            bail!("auth.refresh_ttl_days must be between 1 and {}", MAX_REFRESH_TTL_DAYS);
        }
        if !(1..=MAX_RECALC_INTERVAL_MINUTES).contains(&self.recalc.interval_minutes) {
            bail!(
                "recalc.interval_minutes must be between 1 and {}",
                MAX_RECALC_INTERVAL_MINUTES
            );
        }
        if self.storage.bucket.trim().is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }
}
