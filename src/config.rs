use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BiocaptureConfig {
    pub detection: DetectionConfig,
    pub authenticator: AuthenticatorConfig,
    pub camera: CameraConfig,
    pub native: NativeConfig,
    pub upload: UploadConfig,
    pub recovery: RecoverySettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Upper bound for each individual device probe, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AuthenticatorConfig {
    /// Relying party identifier (effective domain)
    #[serde(default = "default_rp_id")]
    pub rp_id: String,

    /// Relying party display name
    #[serde(default = "default_rp_name")]
    pub rp_name: String,

    /// Account name registered with the credential
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Human-readable account name
    #[serde(default = "default_user_display_name")]
    pub user_display_name: String,

    /// Ceremony deadline; sensors can be slow to respond
    #[serde(default = "default_ceremony_timeout_secs")]
    pub ceremony_timeout_secs: u64,

    /// Random challenge length in bytes
    #[serde(default = "default_challenge_len")]
    pub challenge_len: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Delay before the automatic snapshot so the subject can frame themselves
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Deadline for the camera stream to start
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Requested video width
    #[serde(default = "default_camera_width")]
    pub width: u32,

    /// Requested video height
    #[serde(default = "default_camera_height")]
    pub height: u32,

    /// JPEG quality for snapshots (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NativeConfig {
    /// Delay of the simulated native device prompt
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UploadConfig {
    /// Largest accepted upload, inclusive
    #[serde(default = "default_upload_max_bytes")]
    pub max_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecoverySettings {
    /// Maximum number of retry attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay between retries
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Whether to use exponential backoff
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
}

impl DetectionConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl AuthenticatorConfig {
    pub fn ceremony_timeout(&self) -> Duration {
        Duration::from_secs(self.ceremony_timeout_secs)
    }
}

impl CameraConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl NativeConfig {
    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }
}

impl BiocaptureConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("biocapture.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("detection.probe_timeout_ms", default_probe_timeout_ms())?
            .set_default("authenticator.rp_id", default_rp_id())?
            .set_default("authenticator.rp_name", default_rp_name())?
            .set_default("authenticator.user_name", default_user_name())?
            .set_default("authenticator.user_display_name", default_user_display_name())?
            .set_default(
                "authenticator.ceremony_timeout_secs",
                default_ceremony_timeout_secs(),
            )?
            .set_default("authenticator.challenge_len", default_challenge_len() as u64)?
            .set_default("camera.settle_delay_ms", default_settle_delay_ms())?
            .set_default("camera.acquire_timeout_ms", default_acquire_timeout_ms())?
            .set_default("camera.width", default_camera_width())?
            .set_default("camera.height", default_camera_height())?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("native.simulated_delay_ms", default_simulated_delay_ms())?
            .set_default("upload.max_bytes", default_upload_max_bytes())?
            .set_default("recovery.max_retries", default_max_retries())?
            .set_default("recovery.base_delay_ms", default_base_delay_ms())?
            .set_default("recovery.max_delay_ms", default_max_delay_ms())?
            .set_default("recovery.exponential_backoff", default_exponential_backoff())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. BIOCAPTURE_CAMERA__SETTLE_DELAY_MS
            .add_source(
                Environment::with_prefix("BIOCAPTURE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: BiocaptureConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.probe_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Detection probe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.authenticator.rp_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "Authenticator rp_id must not be empty".to_string(),
            ));
        }

        if self.authenticator.ceremony_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Authenticator ceremony_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.authenticator.challenge_len < 16 {
            return Err(ConfigError::Message(
                "Authenticator challenge_len must be at least 16 bytes".to_string(),
            ));
        }

        if self.camera.acquire_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera acquire_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Message(
                "Upload max_bytes must be greater than 0".to_string(),
            ));
        }

        if self.native.simulated_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Native simulated_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.recovery.base_delay_ms == 0 || self.recovery.max_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Recovery delays must be greater than 0".to_string(),
            ));
        }

        if self.recovery.base_delay_ms > self.recovery.max_delay_ms {
            return Err(ConfigError::Message(
                "Recovery base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for BiocaptureConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig {
                probe_timeout_ms: default_probe_timeout_ms(),
            },
            authenticator: AuthenticatorConfig {
                rp_id: default_rp_id(),
                rp_name: default_rp_name(),
                user_name: default_user_name(),
                user_display_name: default_user_display_name(),
                ceremony_timeout_secs: default_ceremony_timeout_secs(),
                challenge_len: default_challenge_len(),
            },
            camera: CameraConfig {
                settle_delay_ms: default_settle_delay_ms(),
                acquire_timeout_ms: default_acquire_timeout_ms(),
                width: default_camera_width(),
                height: default_camera_height(),
                jpeg_quality: default_jpeg_quality(),
            },
            native: NativeConfig {
                simulated_delay_ms: default_simulated_delay_ms(),
            },
            upload: UploadConfig {
                max_bytes: default_upload_max_bytes(),
            },
            recovery: RecoverySettings {
                max_retries: default_max_retries(),
                base_delay_ms: default_base_delay_ms(),
                max_delay_ms: default_max_delay_ms(),
                exponential_backoff: default_exponential_backoff(),
            },
        }
    }
}

// Default value functions
fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_rp_id() -> String {
    "localhost".to_string()
}
fn default_rp_name() -> String {
    "Biometric Enrollment".to_string()
}
fn default_user_name() -> String {
    "enrollee".to_string()
}
fn default_user_display_name() -> String {
    "Enrollment Subject".to_string()
}
fn default_ceremony_timeout_secs() -> u64 {
    120
}
fn default_challenge_len() -> usize {
    32
}

fn default_settle_delay_ms() -> u64 {
    3000
}
fn default_acquire_timeout_ms() -> u64 {
    10_000
}
fn default_camera_width() -> u32 {
    640
}
fn default_camera_height() -> u32 {
    480
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_simulated_delay_ms() -> u64 {
    1500
}

fn default_upload_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_exponential_backoff() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BiocaptureConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_bytes, 5_242_880);
        assert_eq!(config.camera.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.authenticator.ceremony_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[camera]\nsettle_delay_ms = 500\n\n[authenticator]\nrp_id = \"enroll.example.com\""
        )
        .unwrap();

        let config = BiocaptureConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.settle_delay_ms, 500);
        assert_eq!(config.authenticator.rp_id, "enroll.example.com");
        assert_eq!(config.native.simulated_delay_ms, default_simulated_delay_ms());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = BiocaptureConfig::load_from_file("/nonexistent/biocapture.toml").unwrap();
        assert_eq!(config, BiocaptureConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BiocaptureConfig::default();
        config.upload.max_bytes = 0;
        assert!(config.validate().is_err());

        config.upload.max_bytes = default_upload_max_bytes();
        config.authenticator.rp_id = " ".to_string();
        assert!(config.validate().is_err());

        config.authenticator.rp_id = default_rp_id();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_delays_are_rejected() {
        let mut config = BiocaptureConfig::default();
        config.native.simulated_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BiocaptureConfig::default();
        config.recovery.base_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BiocaptureConfig::default();
        config.recovery.max_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BiocaptureConfig::default();
        config.recovery.base_delay_ms = config.recovery.max_delay_ms + 1;
        assert!(config.validate().is_err());
    }
}
