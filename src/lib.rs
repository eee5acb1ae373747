pub mod bridge;
pub mod config;
pub mod debounce;
pub mod decode;
pub mod device;
pub mod error;
pub mod events;
pub mod image;
pub mod platform;
pub mod scanner;

pub use bridge::{Bridge, BridgeNotification, BridgeRequest, BridgeResponse};
pub use config::BridgeConfig;
pub use debounce::{ScanDebouncer, ScanState};
pub use decode::{DecodeAttempt, DecodeOutcome, ScanPayload};
pub use device::{ElementRef, VideoConstraints, VideoInputDevice};
pub use error::{BridgeError, PlatformError, Result};
pub use events::{
    BarcodeFoundEvent, EventBus, EventDispatcher, EventFilter, EventReceiver, ScanEvent,
    ScanEventHandler, SubscriptionId,
};
pub use image::EncodedImage;
pub use platform::{DecoderEngine, MediaPlatform, MediaStream};
pub use scanner::{AttemptSink, BarcodeScanner, BarcodeScannerBuilder, SessionState};
