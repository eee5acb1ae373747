use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Camera to open on start; the platform picks one by facing mode when unset
    #[serde(default)]
    pub device_id: Option<String>,

    /// Preferred capture resolution (width, height)
    #[serde(default = "default_scanner_resolution")]
    pub resolution: (u32, u32),

    /// Facing mode requested when no device is selected
    #[serde(default = "default_facing_mode")]
    pub facing_mode: String,

    /// Image MIME type used to retain the frame of each successful decode
    #[serde(default)]
    pub last_decoded_image_format: Option<String>,

    /// How long stop waits for the decoder task before aborting it
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// MIME type of still captures
    #[serde(default = "default_capture_format")]
    pub format: String,

    /// Requested photo resolution (width, height)
    #[serde(default = "default_photo_resolution")]
    pub photo_resolution: (u32, u32),

    /// Fill light mode passed to the photo request (auto, off, flash)
    #[serde(default = "default_fill_light_mode")]
    pub fill_light_mode: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventConfig {
    /// Broadcast bus capacity
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Log every dispatched event at debug level
    #[serde(default)]
    pub debug_logging: bool,
}

impl ScannerConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl BridgeConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("barcode-bridge.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "scanner.resolution",
                vec![default_scanner_resolution().0, default_scanner_resolution().1],
            )?
            .set_default("scanner.facing_mode", default_facing_mode())?
            .set_default("scanner.stop_timeout_ms", default_stop_timeout_ms())?
            .set_default("capture.format", default_capture_format())?
            .set_default(
                "capture.photo_resolution",
                vec![default_photo_resolution().0, default_photo_resolution().1],
            )?
            .set_default("capture.fill_light_mode", default_fill_light_mode())?
            .set_default("events.bus_capacity", default_bus_capacity() as i64)?
            .set_default("events.debug_logging", false)?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("BARCODE_BRIDGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: BridgeConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render as a TOML document
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse a TOML document without consulting files or the environment;
    /// absent keys take their defaults
    pub fn from_toml(text: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.resolution.0 == 0 || self.scanner.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Scanner resolution must be greater than 0".to_string(),
            ));
        }

        if self.scanner.stop_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Scanner stop_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if matches!(&self.scanner.last_decoded_image_format, Some(f) if f.trim().is_empty()) {
            return Err(ConfigError::Message(
                "Scanner last_decoded_image_format must not be empty when set".to_string(),
            ));
        }

        if self.capture.format.trim().is_empty() {
            return Err(ConfigError::Message(
                "Capture format must not be empty".to_string(),
            ));
        }

        if self.capture.photo_resolution.0 == 0 || self.capture.photo_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Capture photo_resolution must be greater than 0".to_string(),
            ));
        }

        if self.events.bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            capture: CaptureConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            resolution: default_scanner_resolution(),
            facing_mode: default_facing_mode(),
            last_decoded_image_format: None,
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: default_capture_format(),
            photo_resolution: default_photo_resolution(),
            fill_light_mode: default_fill_light_mode(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            debug_logging: false,
        }
    }
}

// Default value functions
fn default_scanner_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_facing_mode() -> String {
    "environment".to_string()
}
fn default_stop_timeout_ms() -> u64 {
    3000
}

fn default_capture_format() -> String {
    "image/jpeg".to_string()
}
fn default_photo_resolution() -> (u32, u32) {
    (4096, 3072)
}
fn default_fill_light_mode() -> String {
    "auto".to_string()
}

fn default_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.scanner.resolution, (640, 480));
        assert_eq!(config.scanner.facing_mode, "environment");
        assert_eq!(config.capture.photo_resolution, (4096, 3072));
        assert_eq!(config.scanner.stop_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_validation() {
        let mut config = BridgeConfig::default();
        config.scanner.resolution = (0, 480);

        // Should fail validation due to invalid resolution
        assert!(config.validate().is_err());

        // Fix resolution
        config.scanner.resolution = (1280, 720);
        assert!(config.validate().is_ok());

        config.events.bus_capacity = 0;
        assert!(config.validate().is_err());
        config.events.bus_capacity = 10;

        config.scanner.last_decoded_image_format = Some("  ".to_string());
        assert!(config.validate().is_err());
        config.scanner.last_decoded_image_format = Some("image/png".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[scanner]
device_id = "cam-2"
resolution = [1920, 1080]

[capture]
format = "image/png"
"#
        )
        .unwrap();

        let config = BridgeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.scanner.device_id.as_deref(), Some("cam-2"));
        assert_eq!(config.scanner.resolution, (1920, 1080));
        assert_eq!(config.capture.format, "image/png");
        // Untouched sections keep their defaults
        assert_eq!(config.capture.fill_light_mode, "auto");
        assert_eq!(config.events.bus_capacity, 100);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = BridgeConfig::load_from_file("does-not-exist.toml").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let rendered = BridgeConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[scanner]"));
        let parsed = BridgeConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed, BridgeConfig::default());
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = BridgeConfig::from_toml("[events]\nbus_capacity = 8\n").unwrap();
        assert_eq!(config.events.bus_capacity, 8);
        assert_eq!(config.scanner, ScannerConfig::default());
        assert_eq!(config.capture.format, "image/jpeg");
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let err = BridgeConfig::from_toml("[scanner\nresolution = 1").unwrap_err();
        assert_eq!(err.kind(), "Toml");
    }
}
