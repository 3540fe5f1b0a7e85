use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the tierstore engine
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Metadata store configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Tier chains for finished recordings and raw segments
    #[serde(default = "default_recordings")]
    pub recordings: CategoryConfig,
    /// Tier chains for snapshot images, with per-subcategory overrides
    #[serde(default = "default_snapshots")]
    pub snapshots: SnapshotsConfig,
    /// Cameras to register at startup. Stands in for the capture
    /// subsystem's camera-registered notifications in the binary.
    #[serde(default)]
    pub cameras: Vec<String>,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Metadata store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Tier chain for one category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Ordered tiers; files flow strictly forward along the chain
    pub tiers: Vec<TierConfig>,
}

/// Snapshot tier chains: a category default plus optional overrides
/// for individual snapshot subcategories
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotsConfig {
    /// Default tiers for all snapshot subcategories
    pub tiers: Vec<TierConfig>,
    /// Override tiers for face recognition snapshots
    #[serde(default)]
    pub face_recognition: Option<CategoryConfig>,
    /// Override tiers for object detection snapshots
    #[serde(default)]
    pub object_detection: Option<CategoryConfig>,
}

/// One storage location in a tier chain
#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    /// Root path for files in this tier. Cannot be a reserved temp path.
    pub path: PathBuf,
    /// Poll the filesystem for new files instead of relying on change
    /// notification. Slower, but required for some mounts (e.g. NTFS).
    #[serde(default)]
    pub poll: bool,
    /// Move/delete files to the next tier on shutdown. Useful when this
    /// tier lives on a RAM disk.
    #[serde(default)]
    pub move_on_shutdown: bool,
    /// Minimum size of files to keep in this tier
    #[serde(default)]
    pub min_size: SizeSpec,
    /// Maximum size of files to keep in this tier
    #[serde(default)]
    pub max_size: SizeSpec,
    /// Minimum age of files to keep in this tier
    #[serde(default)]
    pub min_age: AgeSpec,
    /// Maximum age of files to keep in this tier
    #[serde(default)]
    pub max_age: AgeSpec,
}

/// Byte threshold expressed in whole units; gb and mb are added together
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeSpec {
    pub gb: Option<u64>,
    pub mb: Option<u64>,
}

impl SizeSpec {
    /// Total threshold in bytes. `None` means unbounded.
    pub fn bytes(&self) -> Option<u64> {
        if self.gb.is_none() && self.mb.is_none() {
            return None;
        }
        let total = self.gb.unwrap_or(0) * 1024 * 1024 * 1024 + self.mb.unwrap_or(0) * 1024 * 1024;
        if total == 0 {
            None
        } else {
            Some(total)
        }
    }
}

/// Duration threshold; days, hours and minutes are added together.
/// A total of zero is the "no limit" sentinel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgeSpec {
    pub days: Option<u64>,
    pub hours: Option<u64>,
    pub minutes: Option<u64>,
}

impl AgeSpec {
    /// Total duration. `None` means unbounded (retain forever).
    pub fn duration(&self) -> Option<Duration> {
        let secs = self.days.unwrap_or(0) * 86_400
            + self.hours.unwrap_or(0) * 3_600
            + self.minutes.unwrap_or(0) * 60;
        if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    "tierstore".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_database_url() -> String {
    "sqlite://tierstore.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_tier() -> TierConfig {
    TierConfig {
        path: PathBuf::from("/"),
        poll: false,
        move_on_shutdown: false,
        min_size: SizeSpec::default(),
        max_size: SizeSpec::default(),
        min_age: AgeSpec::default(),
        max_age: AgeSpec {
            days: Some(7),
            hours: None,
            minutes: None,
        },
    }
}

fn default_recordings() -> CategoryConfig {
    CategoryConfig {
        tiers: vec![default_tier()],
    }
}

fn default_snapshots() -> SnapshotsConfig {
    SnapshotsConfig {
        tiers: vec![default_tier()],
        face_recognition: None,
        object_detection: None,
    }
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/tierstore").required(false))
            .add_source(config::File::with_name("/etc/tierstore/tierstore").required(false))
            // Override with environment variables
            // TIERSTORE__DATABASE__URL -> database.url
            .add_source(
                config::Environment::with_prefix("TIERSTORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Get database connection timeout as Duration
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connect_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}
