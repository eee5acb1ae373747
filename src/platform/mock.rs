use super::interface::{DecoderEngine, MediaPlatform, MediaStream};
use crate::decode::DecodeAttempt;
use crate::device::{DeviceSelection, ElementRef, PhotoSettings, VideoConstraints, VideoInputDevice};
use crate::error::PlatformError;
use crate::image::EncodedImage;
use crate::scanner::AttemptSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, trace};

/// In-memory media platform for tests and the simulator
pub struct MockMediaPlatform {
    devices: Vec<VideoInputDevice>,
    torch_supported: bool,
    enumeration_denied: AtomicBool,
    open_failure: Mutex<Option<PlatformError>>,
    last_constraints: Mutex<Option<VideoConstraints>>,
    streams: Mutex<Vec<Arc<MockMediaStream>>>,
}

impl MockMediaPlatform {
    pub fn new(devices: Vec<VideoInputDevice>) -> Self {
        Self {
            devices,
            torch_supported: true,
            enumeration_denied: AtomicBool::new(false),
            open_failure: Mutex::new(None),
            last_constraints: Mutex::new(None),
            streams: Mutex::new(Vec::new()),
        }
    }

    /// A front and a back camera
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            VideoInputDevice::new("mock-front", "mock-group", "Front Camera"),
            VideoInputDevice::new("mock-back", "mock-group", "Back Camera"),
        ])
    }

    pub fn without_torch(mut self) -> Self {
        self.torch_supported = false;
        self
    }

    /// Make enumeration fail as if camera permission was refused
    pub fn deny_enumeration(&self, denied: bool) {
        self.enumeration_denied.store(denied, Ordering::Relaxed);
    }

    /// Make the next `open_stream` calls fail with `error` (None clears it)
    pub fn fail_open(&self, error: Option<PlatformError>) {
        *self.open_failure.lock() = error;
    }

    pub fn last_constraints(&self) -> Option<VideoConstraints> {
        self.last_constraints.lock().clone()
    }

    /// Every stream opened so far, oldest first
    pub fn streams(&self) -> Vec<Arc<MockMediaStream>> {
        self.streams.lock().clone()
    }

    fn pick_device(&self, selection: &DeviceSelection) -> Result<&VideoInputDevice, PlatformError> {
        match selection {
            DeviceSelection::Device(id) => self
                .devices
                .iter()
                .find(|d| &d.device_id == id)
                .ok_or_else(|| PlatformError::Camera {
                    details: format!("Requested device '{}' not found", id),
                }),
            DeviceSelection::FacingMode(mode) => {
                let wanted = if mode == "user" { "front" } else { "back" };
                self.devices
                    .iter()
                    .find(|d| d.label.to_lowercase().contains(wanted))
                    .or_else(|| self.devices.first())
                    .ok_or_else(|| PlatformError::PlatformUnavailable("No camera present".to_string()))
            }
        }
    }
}

#[async_trait]
impl MediaPlatform for MockMediaPlatform {
    async fn list_video_input_devices(&self) -> Result<Vec<VideoInputDevice>, PlatformError> {
        if self.enumeration_denied.load(Ordering::Relaxed) {
            return Err(PlatformError::PlatformUnavailable(
                "Permission to enumerate cameras denied".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }

    async fn open_stream(
        &self,
        constraints: &VideoConstraints,
        video: &ElementRef,
    ) -> Result<Arc<dyn MediaStream>, PlatformError> {
        *self.last_constraints.lock() = Some(constraints.clone());

        if let Some(error) = self.open_failure.lock().clone() {
            return Err(error);
        }

        let device = self.pick_device(&constraints.selection)?;
        info!(
            "Mock stream opened on '{}' into element '{}'",
            device.device_id,
            video.as_str()
        );

        let stream = Arc::new(MockMediaStream::new(
            device.device_id.clone(),
            self.torch_supported,
        ));
        self.streams.lock().push(Arc::clone(&stream));
        Ok(stream as Arc<dyn MediaStream>)
    }
}

/// Stream handed out by [`MockMediaPlatform`]
pub struct MockMediaStream {
    device_id: String,
    torch_supported: bool,
    torch: AtomicBool,
    stopped: AtomicBool,
    frames_rendered: AtomicU64,
    photos_taken: AtomicU64,
}

impl MockMediaStream {
    pub fn new(device_id: String, torch_supported: bool) -> Self {
        Self {
            device_id,
            torch_supported,
            torch: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            frames_rendered: AtomicU64::new(0),
            photos_taken: AtomicU64::new(0),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn photos_taken(&self) -> u64 {
        self.photos_taken.load(Ordering::Relaxed)
    }

    fn ensure_live(&self) -> Result<(), PlatformError> {
        if self.is_stopped() {
            return Err(PlatformError::Camera {
                details: "Stream already stopped".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaStream for MockMediaStream {
    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }

    fn torch_supported(&self) -> bool {
        self.torch_supported
    }

    fn torch_enabled(&self) -> bool {
        self.torch.load(Ordering::Relaxed)
    }

    async fn set_torch(&self, on: bool) -> Result<(), PlatformError> {
        self.ensure_live()?;
        if !self.torch_supported {
            return Err(PlatformError::Camera {
                details: "Track has no torch capability".to_string(),
            });
        }
        self.torch.store(on, Ordering::Relaxed);
        debug!("Mock torch {}", if on { "on" } else { "off" });
        Ok(())
    }

    async fn take_photo(
        &self,
        _target: &ElementRef,
        settings: &PhotoSettings,
    ) -> Result<EncodedImage, PlatformError> {
        self.ensure_live().map_err(|e| PlatformError::Capture {
            details: e.detail(),
        })?;
        let n = self.photos_taken.fetch_add(1, Ordering::Relaxed);

        let body = format!(
            "photo:{}:{}x{}:{}",
            n, settings.image_width, settings.image_height, settings.fill_light_mode
        );
        let bytes = if settings.format == "image/jpeg" {
            // JPEG markers around a small body describing the request
            let mut bytes = vec![0xFF, 0xD8];
            bytes.extend_from_slice(body.as_bytes());
            bytes.extend_from_slice(&[0xFF, 0xD9]);
            bytes
        } else {
            body.into_bytes()
        };
        Ok(EncodedImage::new(settings.format.clone(), bytes))
    }

    async fn render_frame(&self, format: &str) -> Result<EncodedImage, PlatformError> {
        self.ensure_live()?;
        let n = self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        Ok(EncodedImage::new(format, format!("frame:{}", n).into_bytes()))
    }

    async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::Relaxed) {
            debug!("Mock stream on '{}' stopped", self.device_id);
        }
    }
}

/// Decoder replaying a fixed list of attempts, one per frame interval
pub struct ScriptedDecoder {
    attempts: Vec<DecodeAttempt>,
    frame_interval: Duration,
    finished: Notify,
    runs: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new(attempts: Vec<DecodeAttempt>, frame_interval: Duration) -> Self {
        Self {
            attempts,
            frame_interval,
            finished: Notify::new(),
            runs: AtomicUsize::new(0),
        }
    }

    /// Resolves once a run has replayed the whole script
    pub async fn wait_finished(&self) {
        self.finished.notified().await
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DecoderEngine for ScriptedDecoder {
    async fn run(
        &self,
        _stream: Arc<dyn MediaStream>,
        sink: AttemptSink,
    ) -> Result<(), PlatformError> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        debug!("Scripted decoder replaying {} attempts", self.attempts.len());

        for attempt in &self.attempts {
            tokio::select! {
                _ = sink.closed() => return Ok(()),
                _ = tokio::time::sleep(self.frame_interval) => {}
            }
            if !sink.deliver(attempt.clone()).await {
                return Ok(());
            }
        }

        self.finished.notify_one();
        Ok(())
    }
}

type FeedItem = (DecodeAttempt, oneshot::Sender<bool>);

/// Decoder fed attempt by attempt through a [`DecoderFeed`].
/// Attempts sent while no session runs are held for the next one.
pub struct ChannelDecoder {
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedItem>>,
}

/// Sending half of a [`ChannelDecoder`]
#[derive(Clone)]
pub struct DecoderFeed {
    sender: mpsc::UnboundedSender<FeedItem>,
}

impl ChannelDecoder {
    pub fn channel() -> (Self, DecoderFeed) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                receiver: tokio::sync::Mutex::new(receiver),
            },
            DecoderFeed { sender },
        )
    }
}

impl DecoderFeed {
    /// Hand one attempt to the running session. Resolves to whether the
    /// session accepted it, once it has been fully processed.
    pub async fn send(&self, attempt: DecodeAttempt) -> bool {
        let (ack, accepted) = oneshot::channel();
        if self.sender.send((attempt, ack)).is_err() {
            return false;
        }
        accepted.await.unwrap_or(false)
    }
}

#[async_trait]
impl DecoderEngine for ChannelDecoder {
    async fn run(
        &self,
        _stream: Arc<dyn MediaStream>,
        sink: AttemptSink,
    ) -> Result<(), PlatformError> {
        let mut receiver = self.receiver.lock().await;

        loop {
            tokio::select! {
                _ = sink.closed() => return Ok(()),
                item = receiver.recv() => {
                    let Some((attempt, ack)) = item else {
                        return Ok(());
                    };
                    trace!("Feeding attempt into session {}", sink.session_id());
                    let accepted = sink.deliver(attempt).await;
                    let _ = ack.send(accepted);
                    if !accepted {
                        return Ok(());
                    }
                }
            }
        }
    }
}
