use super::protocol::{BridgeNotification, BridgeRequest, BridgeResponse};
use crate::error::{BridgeError, Result};
use crate::events::{EventFilter, EventReceiver};
use crate::scanner::BarcodeScanner;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes bridge requests into a [`BarcodeScanner`]
#[derive(Clone)]
pub struct Bridge {
    scanner: Arc<BarcodeScanner>,
}

impl Bridge {
    pub fn new(scanner: Arc<BarcodeScanner>) -> Self {
        Self { scanner }
    }

    pub fn scanner(&self) -> &Arc<BarcodeScanner> {
        &self.scanner
    }

    /// Execute one request; failures become error responses
    pub async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        let method = request.method();
        debug!("Bridge call {}", method);

        match self.execute(request).await {
            Ok(result) => BridgeResponse::ok(result),
            Err(e) => {
                warn!("Bridge call {} failed: {}", method, e);
                BridgeResponse::failed(&e)
            }
        }
    }

    /// Parse a JSON request, execute it and render the JSON response
    pub async fn handle_json(&self, text: &str) -> String {
        let response = match serde_json::from_str::<BridgeRequest>(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Malformed bridge request: {}", e);
                BridgeResponse::failed(&BridgeError::Json(e))
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"ok":false,"error":{{"kind":"Json","message":"{}"}}}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }

    async fn execute(&self, request: BridgeRequest) -> Result<Value> {
        let scanner = &self.scanner;
        let result = match request {
            BridgeRequest::ListVideoInputDevices => {
                serde_json::to_value(scanner.list_devices().await?)?
            }
            BridgeRequest::StartDecoding {
                video,
                width,
                height,
            } => {
                let resolution = match (width, height) {
                    (Some(width), Some(height)) => Some((width, height)),
                    (None, None) => None,
                    _ => {
                        return Err(BridgeError::InvalidRequest(
                            "startDecoding needs both width and height, or neither".to_string(),
                        ))
                    }
                };
                scanner.start_decoding(&video, resolution).await?;
                Value::Null
            }
            BridgeRequest::StopDecoding => {
                scanner.stop_decoding().await?;
                Value::Null
            }
            BridgeRequest::SetSelectedDeviceId { device_id } => {
                scanner.set_device(device_id);
                Value::Null
            }
            BridgeRequest::GetSelectedDeviceId => json!(scanner.get_device()),
            BridgeRequest::SetVideoResolution { width, height } => {
                scanner.set_resolution(width, height);
                Value::Null
            }
            BridgeRequest::SetTorchOn => {
                scanner.set_torch(true).await?;
                Value::Null
            }
            BridgeRequest::SetTorchOff => {
                scanner.set_torch(false).await?;
                Value::Null
            }
            BridgeRequest::ToggleTorch => {
                scanner.toggle_torch().await?;
                Value::Null
            }
            BridgeRequest::Capture { canvas } => json!(scanner.capture_still(&canvas).await?),
            BridgeRequest::SetLastDecodedPictureFormat { format } => {
                scanner.set_last_decoded_image_format(format);
                Value::Null
            }
            BridgeRequest::GetLastDecodedPicture => json!(scanner.get_last_decoded_image()),
        };
        Ok(result)
    }

    /// Stream of events rendered as bridge notifications
    pub fn notifications(&self) -> NotificationStream {
        NotificationStream {
            receiver: self
                .scanner
                .event_receiver(EventFilter::All, "bridge-notifications"),
        }
    }
}

pub struct NotificationStream {
    receiver: EventReceiver,
}

impl NotificationStream {
    /// Next notification; `None` once the scanner is gone. Events dropped
    /// because the consumer fell behind are skipped.
    pub async fn next(&mut self) -> Option<BridgeNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(BridgeNotification::from(&event)),
                Err(BridgeError::EventsLagged { skipped }) => {
                    warn!("Notification stream skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::decode::{DecodeAttempt, ScanPayload};
    use crate::device::ElementRef;
    use crate::platform::{ChannelDecoder, DecoderFeed, MediaStream, MockMediaPlatform};
    use crate::scanner::BarcodeScannerBuilder;
    use tokio::time::{timeout, Duration};

    fn bridge() -> (Bridge, Arc<MockMediaPlatform>, DecoderFeed) {
        let platform = Arc::new(MockMediaPlatform::with_default_devices());
        let (decoder, feed) = ChannelDecoder::channel();
        let scanner = BarcodeScannerBuilder::new()
            .platform(platform.clone())
            .decoder(Arc::new(decoder))
            .build()
            .unwrap();
        (Bridge::new(Arc::new(scanner)), platform, feed)
    }

    async fn call(bridge: &Bridge, request: Value) -> Value {
        let response = bridge.handle_json(&request.to_string()).await;
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn test_list_devices_call() {
        let (bridge, _, _) = bridge();
        let response = call(&bridge, json!({ "method": "listVideoInputDevices" })).await;
        assert_eq!(response["ok"], true);
        assert_eq!(response["result"][0]["deviceId"], "mock-front");
        assert_eq!(response["result"][1]["label"], "Back Camera");
    }

    #[tokio::test]
    async fn test_list_devices_denied_call() {
        let (bridge, platform, _) = bridge();
        platform.deny_enumeration(true);
        let response = call(&bridge, json!({ "method": "listVideoInputDevices" })).await;
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"]["kind"], "PlatformUnavailable");
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_session_over_bridge() {
        let (bridge, platform, feed) = bridge();
        let mut notifications = bridge.notifications();

        let response = call(
            &bridge,
            json!({
                "method": "startDecoding",
                "params": { "video": "preview", "width": 800, "height": 600 }
            }),
        )
        .await;
        assert_eq!(response, json!({ "ok": true }));
        assert_eq!(platform.last_constraints().unwrap().width, Some(800));

        let device = call(&bridge, json!({ "method": "getSelectedDeviceId" })).await;
        assert_eq!(device["result"], "mock-back");

        assert!(feed.send(DecodeAttempt::found(ScanPayload::new("QR_CODE", "hello"))).await);
        assert!(feed.send(DecodeAttempt::not_found()).await);

        let first = timeout(Duration::from_millis(200), notifications.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.event, "BarcodeFound");
        assert_eq!(first.payload["content"], "hello");
        let second = timeout(Duration::from_millis(200), notifications.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.event, "BarcodeLost");

        let capture = call(
            &bridge,
            json!({ "method": "capture", "params": { "canvas": "snap" } }),
        )
        .await;
        assert!(capture["result"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));

        let toggled = call(&bridge, json!({ "method": "toggleTorch" })).await;
        assert_eq!(toggled["ok"], true);
        assert!(platform.streams()[0].torch_enabled());

        let stopped = call(&bridge, json!({ "method": "stopDecoding" })).await;
        assert_eq!(stopped["ok"], true);
        assert!(platform.streams()[0].is_stopped());
    }

    #[tokio::test]
    async fn test_start_failure_over_bridge() {
        let (bridge, _, _) = bridge();
        call(
            &bridge,
            json!({ "method": "setSelectedDeviceId", "params": { "deviceId": "ghost" } }),
        )
        .await;
        let response = call(
            &bridge,
            json!({ "method": "startDecoding", "params": { "video": "preview" } }),
        )
        .await;
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"]["kind"], "StartDecodingFailed");
    }

    #[tokio::test]
    async fn test_last_decoded_picture_over_bridge() {
        let (bridge, _, feed) = bridge();
        let empty = call(&bridge, json!({ "method": "getLastDecodedPicture" })).await;
        assert_eq!(empty["result"], "");

        call(
            &bridge,
            json!({ "method": "setLastDecodedPictureFormat", "params": { "format": "image/png" } }),
        )
        .await;
        call(
            &bridge,
            json!({ "method": "startDecoding", "params": { "video": "preview" } }),
        )
        .await;
        assert!(feed.send(DecodeAttempt::found(ScanPayload::new("QR_CODE", "x"))).await);

        let picture = call(&bridge, json!({ "method": "getLastDecodedPicture" })).await;
        assert!(picture["result"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_half_resolution_is_rejected() {
        let (bridge, platform, _) = bridge();
        let response = call(
            &bridge,
            json!({ "method": "startDecoding", "params": { "video": "preview", "width": 1280 } }),
        )
        .await;
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"]["kind"], "InvalidRequest");
        assert!(platform.streams().is_empty());
        assert_eq!(bridge.scanner().resolution(), (640, 480));
    }

    #[tokio::test]
    async fn test_notifications_skip_lag() {
        let mut config = BridgeConfig::default();
        config.events.bus_capacity = 2;
        let (decoder, feed) = ChannelDecoder::channel();
        let scanner = BarcodeScannerBuilder::new()
            .config(config)
            .platform(Arc::new(MockMediaPlatform::with_default_devices()))
            .decoder(Arc::new(decoder))
            .build()
            .unwrap();
        let bridge = Bridge::new(Arc::new(scanner));
        let mut notifications = bridge.notifications();

        bridge
            .scanner()
            .start_decoding(&ElementRef::new("preview"), None)
            .await
            .unwrap();
        for attempt in [
            DecodeAttempt::found(ScanPayload::new("QR_CODE", "A")),
            DecodeAttempt::not_found(),
            DecodeAttempt::found(ScanPayload::new("QR_CODE", "B")),
            DecodeAttempt::not_found(),
        ] {
            assert!(feed.send(attempt).await);
        }

        // The two oldest events were overwritten; the stream resumes after them
        let next = timeout(Duration::from_millis(200), notifications.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.event, "BarcodeFound");
        assert_eq!(next.payload["content"], "B");
        let next = timeout(Duration::from_millis(200), notifications.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.event, "BarcodeLost");
    }

    #[tokio::test]
    async fn test_malformed_request() {
        let (bridge, _, _) = bridge();
        let response: Value = serde_json::from_str(&bridge.handle_json("{not json").await).unwrap();
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"]["kind"], "Json");
    }
}
