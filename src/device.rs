use crate::config::ScannerConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Camera descriptor as reported by device enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInputDevice {
    pub device_id: String,
    pub group_id: String,
    pub kind: String,
    pub label: String,
}

impl VideoInputDevice {
    pub fn new(
        device_id: impl Into<String>,
        group_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            group_id: group_id.into(),
            kind: "videoinput".to_string(),
            label: label.into(),
        }
    }
}

/// Which camera a stream should be opened on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// An exact device id
    Device(String),
    /// Any camera facing this way (`environment`, `user`)
    FacingMode(String),
}

/// Constraints for opening a video stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub selection: DeviceSelection,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoConstraints {
    pub fn new(device_id: Option<&str>, facing_mode: &str, resolution: Option<(u32, u32)>) -> Self {
        let selection = match device_id {
            Some(id) if !id.is_empty() => DeviceSelection::Device(id.to_string()),
            _ => DeviceSelection::FacingMode(facing_mode.to_string()),
        };
        Self {
            selection,
            width: resolution.map(|(w, _)| w).filter(|w| *w > 0),
            height: resolution.map(|(_, h)| h).filter(|h| *h > 0),
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config.device_id.as_deref(),
            &config.facing_mode,
            Some(config.resolution),
        )
    }

    /// Media constraints object in the form browsers accept
    pub fn to_json(&self) -> Value {
        let mut video = Map::new();
        match &self.selection {
            DeviceSelection::Device(id) => {
                video.insert("deviceId".to_string(), json!({ "exact": id }));
            }
            DeviceSelection::FacingMode(mode) => {
                video.insert("facingMode".to_string(), json!(mode));
            }
        }
        if let Some(width) = self.width {
            video.insert("width".to_string(), json!({ "ideal": width }));
        }
        if let Some(height) = self.height {
            video.insert("height".to_string(), json!({ "ideal": height }));
        }
        json!({ "video": video })
    }
}

/// Options for a still photo request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSettings {
    /// MIME type the still is encoded as
    pub format: String,
    pub image_width: u32,
    pub image_height: u32,
    pub fill_light_mode: String,
}

/// Opaque reference to a host element (video or canvas) the platform renders into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
