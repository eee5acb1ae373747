use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Event receiver lagged behind by {skipped} events")]
    EventsLagged { skipped: u64 },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures reported by the media platform or raised while driving it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Media platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("Failed to start decoding: {0}")]
    StartDecodingFailed(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Camera operation failed: {details}")]
    Camera { details: String },

    #[error("Still capture failed: {details}")]
    Capture { details: String },
}

impl BridgeError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Stable identifier used on the bridge wire
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "Config",
            BridgeError::Serialization(_) | BridgeError::Deserialization(_) => "Toml",
            BridgeError::Io(_) => "Io",
            BridgeError::Json(_) => "Json",
            BridgeError::Platform(e) => e.kind(),
            BridgeError::InvalidRequest(_) => "InvalidRequest",
            BridgeError::EventsLagged { .. } => "EventsLagged",
            BridgeError::System { .. } => "System",
            BridgeError::Component { .. } => "Component",
        }
    }
}

impl PlatformError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::PlatformUnavailable(_) => "PlatformUnavailable",
            PlatformError::StartDecodingFailed(_) => "StartDecodingFailed",
            PlatformError::DecodeError(_) => "DecodeError",
            PlatformError::Camera { .. } => "Camera",
            PlatformError::Capture { .. } => "Capture",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            PlatformError::PlatformUnavailable(d)
            | PlatformError::StartDecodingFailed(d)
            | PlatformError::DecodeError(d) => d.clone(),
            PlatformError::Camera { details } | PlatformError::Capture { details } => {
                details.clone()
            }
        }
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_conversion() {
        let err: BridgeError = PlatformError::PlatformUnavailable("denied".to_string()).into();
        assert_eq!(err.kind(), "PlatformUnavailable");
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_lag_is_typed() {
        let err = BridgeError::EventsLagged { skipped: 3 };
        assert_eq!(err.kind(), "EventsLagged");
        assert_eq!(err.to_string(), "Event receiver lagged behind by 3 events");
    }

    #[test]
    fn test_detail_strips_prefix() {
        let err = PlatformError::StartDecodingFailed("device busy".to_string());
        assert_eq!(err.detail(), "device busy");
        assert_eq!(err.to_string(), "Failed to start decoding: device busy");
    }
}
