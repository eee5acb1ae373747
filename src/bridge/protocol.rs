use crate::device::ElementRef;
use crate::error::BridgeError;
use crate::events::ScanEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Calls a host can make across the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum BridgeRequest {
    ListVideoInputDevices,
    StartDecoding {
        video: ElementRef,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
    StopDecoding,
    SetSelectedDeviceId {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    GetSelectedDeviceId,
    SetVideoResolution {
        width: u32,
        height: u32,
    },
    SetTorchOn,
    SetTorchOff,
    ToggleTorch,
    Capture {
        canvas: ElementRef,
    },
    SetLastDecodedPictureFormat {
        #[serde(default)]
        format: Option<String>,
    },
    GetLastDecodedPicture,
}

impl BridgeRequest {
    pub fn method(&self) -> &'static str {
        match self {
            BridgeRequest::ListVideoInputDevices => "listVideoInputDevices",
            BridgeRequest::StartDecoding { .. } => "startDecoding",
            BridgeRequest::StopDecoding => "stopDecoding",
            BridgeRequest::SetSelectedDeviceId { .. } => "setSelectedDeviceId",
            BridgeRequest::GetSelectedDeviceId => "getSelectedDeviceId",
            BridgeRequest::SetVideoResolution { .. } => "setVideoResolution",
            BridgeRequest::SetTorchOn => "setTorchOn",
            BridgeRequest::SetTorchOff => "setTorchOff",
            BridgeRequest::ToggleTorch => "toggleTorch",
            BridgeRequest::Capture { .. } => "capture",
            BridgeRequest::SetLastDecodedPictureFormat { .. } => "setLastDecodedPictureFormat",
            BridgeRequest::GetLastDecodedPicture => "getLastDecodedPicture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFault {
    pub kind: String,
    pub message: String,
}

/// Reply to a [`BridgeRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeFault>,
}

impl BridgeResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            ok: true,
            result,
            error: None,
        }
    }

    pub fn failed(error: &BridgeError) -> Self {
        let message = match error {
            BridgeError::Platform(platform) => platform.detail(),
            other => other.to_string(),
        };
        Self {
            ok: false,
            result: Value::Null,
            error: Some(BridgeFault {
                kind: error.kind().to_string(),
                message,
            }),
        }
    }
}

/// Event pushed from the bridge to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeNotification {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl From<&ScanEvent> for BridgeNotification {
    fn from(event: &ScanEvent) -> Self {
        let payload = match event {
            ScanEvent::BarcodeFound(found) => json!({
                "content": found.content,
                "format": found.format,
                "timestamp": found.timestamp,
            }),
            ScanEvent::BarcodeLost => Value::Null,
            ScanEvent::DecodeError { detail } => json!({ "detail": detail }),
        };
        Self {
            event: event.event_type().to_string(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::events::BarcodeFoundEvent;
    use chrono::Utc;

    #[test]
    fn test_request_wire_format() {
        let request: BridgeRequest = serde_json::from_value(json!({
            "method": "startDecoding",
            "params": { "video": "preview", "width": 1280, "height": 720 }
        }))
        .unwrap();
        assert_eq!(
            request,
            BridgeRequest::StartDecoding {
                video: ElementRef::new("preview"),
                width: Some(1280),
                height: Some(720),
            }
        );

        let request: BridgeRequest =
            serde_json::from_value(json!({ "method": "stopDecoding" })).unwrap();
        assert_eq!(request, BridgeRequest::StopDecoding);
        assert_eq!(request.method(), "stopDecoding");

        let request: BridgeRequest = serde_json::from_value(json!({
            "method": "setSelectedDeviceId",
            "params": { "deviceId": "cam-1" }
        }))
        .unwrap();
        assert_eq!(request.method(), "setSelectedDeviceId");
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let result: Result<BridgeRequest, _> =
            serde_json::from_value(json!({ "method": "selfDestruct" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_response_shape() {
        let error: BridgeError =
            PlatformError::StartDecodingFailed("NotAllowedError".to_string()).into();
        let value = serde_json::to_value(BridgeResponse::failed(&error)).unwrap();
        assert_eq!(
            value,
            json!({
                "ok": false,
                "error": { "kind": "StartDecodingFailed", "message": "NotAllowedError" }
            })
        );
    }

    #[test]
    fn test_notifications() {
        let found = ScanEvent::BarcodeFound(BarcodeFoundEvent {
            content: "978-3".to_string(),
            format: "EAN_13".to_string(),
            timestamp: Utc::now(),
        });
        let notification = BridgeNotification::from(&found);
        assert_eq!(notification.event, "BarcodeFound");
        assert_eq!(notification.payload["content"], "978-3");
        assert_eq!(notification.payload["format"], "EAN_13");

        let lost = serde_json::to_value(BridgeNotification::from(&ScanEvent::BarcodeLost)).unwrap();
        assert_eq!(lost, json!({ "event": "BarcodeLost" }));
    }
}
