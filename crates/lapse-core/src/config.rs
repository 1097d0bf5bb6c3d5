use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_CAPTURE_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_CAPTURE_FOLDER: &str = "screenshots";
pub const DEFAULT_STAGING_DIR: &str = "media";
pub const DEFAULT_RETENTION_HOUR: u8 = 23;
pub const DEFAULT_RETENTION_MINUTE: u8 = 42;
pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Top-level config (lapse.toml + LAPSE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LapseConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Remote store credentials. When absent, uploads and listings fail with
    /// a "not configured" error but the control surface still works.
    #[serde(default)]
    pub cloudinary: Option<CloudinaryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// The single browser origin allowed to call the control surface.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

/// Where frames come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureSource {
    /// Run an external screenshot command (`capture.command`).
    #[default]
    Command,
    /// Grab the primary monitor in-process (requires the `screen` feature).
    Screen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_interval")]
    pub interval_secs: u64,
    /// Folder key used on the remote store.
    #[serde(default = "default_capture_folder")]
    pub folder: String,
    #[serde(default)]
    pub source: CaptureSource,
    /// Shell command used by the `command` source. `{path}` is replaced with
    /// the staging file the command must write.
    #[serde(default = "default_capture_command")]
    pub command: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_CAPTURE_INTERVAL_SECS,
            folder: DEFAULT_CAPTURE_FOLDER.to_string(),
            source: CaptureSource::default(),
            command: default_capture_command(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Local time of day at which the staging directory is purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_hour")]
    pub hour: u8,
    #[serde(default = "default_retention_minute")]
    pub minute: u8,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hour: DEFAULT_RETENTION_HOUR,
            minute: DEFAULT_RETENTION_MINUTE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub dir: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Engine polling cadence in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_cloudinary_base_url")]
    pub base_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_cors_origin() -> String {
    DEFAULT_CORS_ORIGIN.to_string()
}
fn default_capture_interval() -> u64 {
    DEFAULT_CAPTURE_INTERVAL_SECS
}
fn default_capture_folder() -> String {
    DEFAULT_CAPTURE_FOLDER.to_string()
}
fn default_capture_command() -> String {
    if cfg!(target_os = "macos") {
        "screencapture -x {path}".to_string()
    } else {
        "scrot --overwrite {path}".to_string()
    }
}
fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}
fn default_retention_hour() -> u8 {
    DEFAULT_RETENTION_HOUR
}
fn default_retention_minute() -> u8 {
    DEFAULT_RETENTION_MINUTE
}
fn default_staging_dir() -> String {
    DEFAULT_STAGING_DIR.to_string()
}
fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_cloudinary_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

impl LapseConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Sources, later ones winning:
    ///   1. The TOML file (explicit path, else `./lapse.toml`; missing is fine)
    ///   2. `CLOUDINARY_CLOUD_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET`
    ///   3. `LAPSE_*` variables, `__` separating sections (`LAPSE_GATEWAY__PORT=9000`)
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        if !std::path::Path::new(path).exists() {
            debug!(path, "config file not found, using defaults and env");
        }
        if let Some(missing) = partial_cloudinary_env() {
            warn!(
                missing = %missing.join(", "),
                "Cloudinary env credentials are only partly set"
            );
        }

        let config: LapseConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(
                Env::prefixed("CLOUDINARY_")
                    .only(&["cloud_name", "api_key", "api_secret"])
                    .map(|key| format!("cloudinary.{}", key.as_str()).into()),
            )
            .merge(Env::prefixed("LAPSE_").split("__"))
            .extract()
            .map_err(|e| crate::error::LapseError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler could never honour.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::LapseError::InvalidSetting;

        if self.capture.interval_secs == 0 {
            return Err(InvalidSetting {
                key: "capture.interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retention.hour > 23 {
            return Err(InvalidSetting {
                key: "retention.hour",
                reason: format!("{} is not an hour of the day", self.retention.hour),
            });
        }
        if self.retention.minute > 59 {
            return Err(InvalidSetting {
                key: "retention.minute",
                reason: format!("{} is not a minute of the hour", self.retention.minute),
            });
        }
        if self.scheduler.tick_ms == 0 {
            return Err(InvalidSetting {
                key: "scheduler.tick_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.capture.source == CaptureSource::Command && !self.capture.command.contains("{path}")
        {
            return Err(InvalidSetting {
                key: "capture.command",
                reason: "must contain a {path} placeholder".to_string(),
            });
        }
        Ok(())
    }
}

const DEFAULT_CONFIG_PATH: &str = "lapse.toml";

const CLOUDINARY_ENV_VARS: [&str; 3] = [
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
];

/// Names of the unset Cloudinary variables when some, but not all, are set.
fn partial_cloudinary_env() -> Option<Vec<&'static str>> {
    let missing: Vec<_> = CLOUDINARY_ENV_VARS
        .into_iter()
        .filter(|var| std::env::var_os(var).is_none())
        .collect();
    (!missing.is_empty() && missing.len() < CLOUDINARY_ENV_VARS.len()).then_some(missing)
}
