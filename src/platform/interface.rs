use crate::device::{ElementRef, PhotoSettings, VideoConstraints, VideoInputDevice};
use crate::error::PlatformError;
use crate::image::EncodedImage;
use crate::scanner::AttemptSink;
use async_trait::async_trait;
use std::sync::Arc;

/// Camera access provided by the hosting environment
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Enumerate cameras. Denied or unsupported enumeration must fail with
    /// `PlatformUnavailable` rather than return a partial list.
    async fn list_video_input_devices(&self) -> Result<Vec<VideoInputDevice>, PlatformError>;

    /// Acquire a stream matching `constraints`, rendering into `video`
    async fn open_stream(
        &self,
        constraints: &VideoConstraints,
        video: &ElementRef,
    ) -> Result<Arc<dyn MediaStream>, PlatformError>;
}

/// An open camera stream
#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Id of the device actually opened
    fn device_id(&self) -> Option<String>;

    /// Whether any video track exposes a torch capability
    fn torch_supported(&self) -> bool;

    /// Current torch setting of the torch-capable track
    fn torch_enabled(&self) -> bool;

    async fn set_torch(&self, on: bool) -> Result<(), PlatformError>;

    /// Take a still photo independent of the decode loop
    async fn take_photo(
        &self,
        target: &ElementRef,
        settings: &PhotoSettings,
    ) -> Result<EncodedImage, PlatformError>;

    /// Encode the frame currently held by the decoder in `format`
    async fn render_frame(&self, format: &str) -> Result<EncodedImage, PlatformError>;

    /// Release the camera
    async fn stop(&self);
}

/// External decoder driving the per-frame loop.
///
/// `run` reports every evaluated frame through `sink` and returns once the
/// sink refuses an attempt or [`AttemptSink::closed`] resolves.
#[async_trait]
pub trait DecoderEngine: Send + Sync {
    async fn run(&self, stream: Arc<dyn MediaStream>, sink: AttemptSink)
        -> Result<(), PlatformError>;
}
