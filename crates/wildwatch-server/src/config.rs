//! Server configuration

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wildwatch_policy::TwilioCredentials;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Where uploads are staged and evidence is kept
    #[serde(default)]
    pub paths: PathsConfig,

    /// Detection store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Bounds on external calls
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Cleanup of abandoned temporary files
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Location used when a request carries no coordinates
    #[serde(default)]
    pub default_location: DefaultLocation,

    /// Reverse geocoding
    #[serde(default)]
    pub geocoder: GeocoderConfig,

    /// SMS alerting
    #[serde(default)]
    pub sms: SmsConfig,

    /// Camera capture
    #[serde(default)]
    pub camera: CameraConfig,

    /// Alert audit log
    #[serde(default)]
    pub audit: AuditConfig,

    /// Classifier configuration file path
    #[serde(default = "default_classifiers_config")]
    pub classifiers_config: String,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_cli(cli);
        Ok(config)
    }

    /// Apply CLI flags and their environment fallbacks
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(store) = &cli.store {
            self.store = StoreConfig::parse(store);
        }
        if let Some(recipient) = &cli.recipient {
            self.sms.recipient = Some(recipient.clone());
        }
        if let Some(sid) = &cli.twilio_account_sid {
            self.sms.account_sid = Some(sid.clone());
        }
        if let Some(token) = &cli.twilio_auth_token {
            self.sms.auth_token = Some(token.clone());
        }
        if let Some(number) = &cli.twilio_phone_number {
            self.sms.from_number = Some(number.clone());
        }
    }

    /// Twilio credentials, when all three parts are configured
    pub fn sms_credentials(&self) -> Option<TwilioCredentials> {
        Some(TwilioCredentials {
            account_sid: self.sms.account_sid.clone()?,
            auth_token: self.sms.auth_token.clone()?,
            from_number: self.sms.from_number.clone()?,
        })
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            evidence_dir: default_evidence_dir(),
        }
    }
}

/// Store backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local, lost on restart
    Memory,
    /// Append-only journal on disk
    Jsonl { path: PathBuf },
    /// Run without a store
    Disabled,
}

impl StoreConfig {
    /// Parse the `--store` flag: `memory`, `disabled`, or a journal path
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "memory" => Self::Memory,
            "disabled" | "none" => Self::Disabled,
            path => Self::Jsonl {
                path: PathBuf::from(path),
            },
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Jsonl {
            path: PathBuf::from("data/threats.jsonl"),
        }
    }
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub store_ms: u64,

    #[serde(default = "default_send_timeout_ms")]
    pub send_ms: u64,

    #[serde(default = "default_geocode_timeout_ms")]
    pub geocode_ms: u64,

    #[serde(default = "default_capture_timeout_ms")]
    pub capture_ms: u64,
}

impl TimeoutConfig {
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn send(&self) -> Duration {
        Duration::from_millis(self.send_ms)
    }

    pub fn geocode(&self) -> Duration {
        Duration::from_millis(self.geocode_ms)
    }

    pub fn capture(&self) -> Duration {
        Duration::from_millis(self.capture_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: default_store_timeout_ms(),
            send_ms: default_send_timeout_ms(),
            geocode_ms: default_geocode_timeout_ms(),
            capture_ms: default_capture_timeout_ms(),
        }
    }
}

/// Temporary file sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Tagged temporary files older than this are deleted
    #[serde(default = "default_temp_max_age_secs")]
    pub temp_max_age_secs: u64,

    /// How often the sweep runs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RetentionConfig {
    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            temp_max_age_secs: default_temp_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Fallback coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLocation {
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// Maximum random offset in degrees
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            jitter: default_jitter(),
        }
    }
}

/// Reverse geocoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_geocoder_url")]
    pub url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_geocoder_url(),
            user_agent: default_user_agent(),
            language: default_language(),
        }
    }
}

/// SMS settings. Without complete credentials alerts are simulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub from_number: Option<String>,

    /// Ranger phone number
    #[serde(default)]
    pub recipient: Option<String>,

    /// Provider base URL override
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Camera capture command. `{output}` in any argument is replaced with the
/// destination path. An empty command means no camera is attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub command: Vec<String>,
}

/// Alert audit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSONL file that mirrors the in-memory trail
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_audit_max_events")]
    pub max_events: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_events: default_audit_max_events(),
        }
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp_files")
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("evidence")
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_geocode_timeout_ms() -> u64 {
    5_000
}

fn default_capture_timeout_ms() -> u64 {
    15_000
}

fn default_temp_max_age_secs() -> u64 {
    3_600
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_latitude() -> f64 {
    10.7905
}

fn default_longitude() -> f64 {
    78.7047
}

fn default_jitter() -> f64 {
    0.01
}

fn default_true() -> bool {
    true
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_user_agent() -> String {
    "wildlife_threat_detection".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_audit_max_events() -> usize {
    1_000
}

fn default_classifiers_config() -> String {
    "classifiers.yaml".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}
