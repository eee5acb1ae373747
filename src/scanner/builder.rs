use super::interface::BarcodeScanner;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::platform::{DecoderEngine, MediaPlatform};
use std::sync::Arc;

/// Builder for [`BarcodeScanner`]
pub struct BarcodeScannerBuilder {
    config: Option<BridgeConfig>,
    platform: Option<Arc<dyn MediaPlatform>>,
    decoder: Option<Arc<dyn DecoderEngine>>,
}

impl BarcodeScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            platform: None,
            decoder: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn platform(mut self, platform: Arc<dyn MediaPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn DecoderEngine>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Build the scanner; the configuration defaults when not given and is
    /// validated either way.
    pub fn build(self) -> Result<BarcodeScanner> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let platform = self
            .platform
            .ok_or_else(|| BridgeError::system("Media platform must be specified"))?;
        let decoder = self
            .decoder
            .ok_or_else(|| BridgeError::system("Decoder engine must be specified"))?;

        Ok(BarcodeScanner::new(config, platform, decoder))
    }
}

impl Default for BarcodeScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
