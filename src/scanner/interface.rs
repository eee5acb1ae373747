use super::images::ImageStore;
use super::session::{ActiveSession, AttemptSink, SessionCore, SessionState};
use crate::config::BridgeConfig;
use crate::decode::DecodeAttempt;
use crate::device::{ElementRef, PhotoSettings, VideoConstraints, VideoInputDevice};
use crate::error::{PlatformError, Result};
use crate::events::{
    EventBus, EventDispatcher, EventFilter, EventReceiver, ScanEventHandler, SubscriptionId,
};
use crate::platform::{DecoderEngine, MediaPlatform};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Device and resolution chosen for the next session
#[derive(Debug, Clone)]
struct Selection {
    device_id: Option<String>,
    resolution: (u32, u32),
}

/// Host-facing facade over one camera and one decoder.
///
/// Lifecycle calls are serialized; at most one session is active at a time.
/// Starting while active stops the running session first.
pub struct BarcodeScanner {
    config: BridgeConfig,
    platform: Arc<dyn MediaPlatform>,
    decoder: Arc<dyn DecoderEngine>,
    selection: Mutex<Selection>,
    state: RwLock<SessionState>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    dispatcher: Arc<EventDispatcher>,
    images: Arc<ImageStore>,
}

impl BarcodeScanner {
    pub fn new(
        config: BridgeConfig,
        platform: Arc<dyn MediaPlatform>,
        decoder: Arc<dyn DecoderEngine>,
    ) -> Self {
        info!(
            "Initializing barcode scanner with {}",
            VideoConstraints::from_config(&config.scanner).to_json()
        );

        let bus = if config.events.debug_logging {
            EventBus::with_debug_logging(config.events.bus_capacity)
        } else {
            EventBus::new(config.events.bus_capacity)
        };

        Self {
            selection: Mutex::new(Selection {
                device_id: config.scanner.device_id.clone(),
                resolution: config.scanner.resolution,
            }),
            state: RwLock::new(SessionState::Idle),
            session: tokio::sync::Mutex::new(None),
            dispatcher: Arc::new(EventDispatcher::new(bus)),
            images: Arc::new(ImageStore::new(
                config.scanner.last_decoded_image_format.clone(),
            )),
            config,
            platform,
            decoder,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_decoding(&self) -> bool {
        self.state() == SessionState::Active
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        if *current != state {
            debug!("Scanner state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Enumerate cameras
    pub async fn list_devices(&self) -> Result<Vec<VideoInputDevice>> {
        match self.platform.list_video_input_devices().await {
            Ok(devices) => {
                debug!("Found {} video input devices", devices.len());
                Ok(devices)
            }
            Err(e) => {
                warn!("Device enumeration failed: {}", e);
                let error = match e {
                    PlatformError::PlatformUnavailable(_) => e,
                    other => PlatformError::PlatformUnavailable(other.detail()),
                };
                Err(error.into())
            }
        }
    }

    /// Begin a decoding session rendering into `video`. When `resolution` is
    /// given it becomes the preferred resolution before the stream opens.
    pub async fn start_decoding(
        &self,
        video: &ElementRef,
        resolution: Option<(u32, u32)>,
    ) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(active) = session.take() {
            info!("Decoding already active, restarting session {}", active.core.id());
            self.shutdown_session(active).await;
        }

        if let Some((width, height)) = resolution {
            self.set_resolution(width, height);
        }

        self.set_state(SessionState::Starting);
        let constraints = self.constraints();
        info!("Starting decoding with {}", constraints.to_json());

        let stream = match self.platform.open_stream(&constraints, video).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start decoding: {}", e);
                self.set_state(SessionState::Idle);
                return Err(PlatformError::StartDecodingFailed(e.detail()).into());
            }
        };

        if let Some(device_id) = stream.device_id() {
            self.selection.lock().device_id = Some(device_id);
        }

        let core = Arc::new(SessionCore::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.images),
            Arc::clone(&stream),
        ));
        let sink = AttemptSink::new(Arc::clone(&core));
        let decoder = Arc::clone(&self.decoder);
        let engine_stream = Arc::clone(&stream);

        let task = tokio::spawn(async move {
            if let Err(e) = decoder.run(engine_stream, sink.clone()).await {
                error!("Decoder engine stopped with error: {}", e);
                sink.deliver(DecodeAttempt::error(e.detail())).await;
            }
            debug!("Decoder loop for session {} ended", sink.session_id());
        });

        info!(
            "Started continuous decode from camera {} (session {})",
            stream.device_id().as_deref().unwrap_or("unknown"),
            core.id()
        );
        *session = Some(ActiveSession { core, stream, task });
        self.set_state(SessionState::Active);

        Ok(())
    }

    /// Tear down the active session. No-op when idle.
    pub async fn stop_decoding(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(active) => {
                self.shutdown_session(active).await;
                info!("Decoding stopped, camera released");
            }
            None => debug!("Stop requested while no session is active"),
        }
        Ok(())
    }

    async fn shutdown_session(&self, active: ActiveSession) {
        self.set_state(SessionState::Stopping);
        let ActiveSession {
            core,
            stream,
            mut task,
        } = active;

        core.close();
        stream.stop().await;

        let timeout = self.config.scanner.stop_timeout();
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => debug!("Decoder task for session {} completed", core.id()),
            Ok(Err(e)) => error!("Error waiting for decoder task: {}", e),
            Err(_) => {
                warn!(
                    "Decoder task did not finish within {:?}, aborting",
                    timeout
                );
                task.abort();
            }
        }

        self.set_state(SessionState::Idle);
    }

    /// Camera to use on the next start
    pub fn set_device(&self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        debug!("Selected device {}", device_id);
        self.selection.lock().device_id = Some(device_id).filter(|id| !id.is_empty());
    }

    /// Selected camera; after a start this is the device actually opened
    pub fn get_device(&self) -> Option<String> {
        self.selection.lock().device_id.clone()
    }

    /// Preferred resolution for the next start
    pub fn set_resolution(&self, width: u32, height: u32) {
        debug!("Preferred resolution {}x{}", width, height);
        self.selection.lock().resolution = (width, height);
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.selection.lock().resolution
    }

    /// Constraints the next start will open the stream with
    pub fn constraints(&self) -> VideoConstraints {
        let selection = self.selection.lock();
        VideoConstraints::new(
            selection.device_id.as_deref(),
            &self.config.scanner.facing_mode,
            Some(selection.resolution),
        )
    }

    /// Switch the torch; a no-op without a session or torch capability
    pub async fn set_torch(&self, on: bool) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            debug!("Torch request ignored, no active session");
            return Ok(());
        };
        if !active.stream.torch_supported() {
            debug!("Torch request ignored, stream has no torch");
            return Ok(());
        }
        active.stream.set_torch(on).await?;
        info!("Torch {}", if on { "on" } else { "off" });
        Ok(())
    }

    pub async fn toggle_torch(&self) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            debug!("Torch toggle ignored, no active session");
            return Ok(());
        };
        if !active.stream.torch_supported() {
            debug!("Torch toggle ignored, stream has no torch");
            return Ok(());
        }
        let on = !active.stream.torch_enabled();
        active.stream.set_torch(on).await?;
        info!("Torch toggled {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Still photo from the active stream as a base64 data URL; empty
    /// without a session.
    pub async fn capture_still(&self, target: &ElementRef) -> Result<String> {
        Ok(self
            .capture_still_shared(target)
            .await?
            .map(|url| url.to_string())
            .unwrap_or_default())
    }

    /// Like [`capture_still`](Self::capture_still) without copying the image
    pub async fn capture_still_shared(&self, target: &ElementRef) -> Result<Option<Arc<str>>> {
        let session = self.session.lock().await;
        self.images.store_capture(None);

        let Some(active) = session.as_ref() else {
            debug!("Capture requested while no session is active");
            return Ok(None);
        };

        let capture = &self.config.capture;
        let settings = PhotoSettings {
            format: capture.format.clone(),
            image_width: capture.photo_resolution.0,
            image_height: capture.photo_resolution.1,
            fill_light_mode: capture.fill_light_mode.clone(),
        };

        let started = std::time::Instant::now();
        let image = active.stream.take_photo(target, &settings).await?;
        let url = image.to_shared_data_url();
        debug!(
            "Captured {} bytes ({}) in {:?}",
            image.bytes.len(),
            image.mime,
            started.elapsed()
        );

        self.images.store_capture(Some(Arc::clone(&url)));
        Ok(Some(url))
    }

    /// Last still capture, empty if none
    pub fn get_last_capture(&self) -> String {
        self.images
            .last_capture()
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    /// Enable (Some) or disable (None) retaining the frame of each
    /// successful decode
    pub fn set_last_decoded_image_format(&self, format: Option<String>) {
        self.images.set_decoded_format(format);
    }

    pub fn last_decoded_image_format(&self) -> Option<String> {
        self.images.decoded_format()
    }

    /// Frame of the last successful decode as a data URL, empty if none
    pub fn get_last_decoded_image(&self) -> String {
        self.last_decoded_image_shared()
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    pub fn last_decoded_image_shared(&self) -> Option<Arc<str>> {
        self.images.last_decoded()
    }

    /// Register a handler for found/lost/error events
    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: ScanEventHandler + 'static,
    {
        self.dispatcher.subscribe(handler)
    }

    pub fn subscribe_arc(&self, handler: Arc<dyn ScanEventHandler>) -> SubscriptionId {
        self.dispatcher.subscribe_arc(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Async stream of events
    pub fn event_receiver(&self, filter: EventFilter, name: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.dispatcher.bus().subscribe(), filter, name.into())
    }

    /// Id of the active session, if any
    pub fn session_id(&self) -> Option<Uuid> {
        self.session
            .try_lock()
            .ok()
            .and_then(|session| session.as_ref().map(|active| active.core.id()))
    }
}

/// Dropping with a session active closes it and aborts the decoder task.
/// The camera is released on the current tokio runtime; outside a runtime
/// the stream is left to its own drop.
impl Drop for BarcodeScanner {
    fn drop(&mut self) {
        if let Some(active) = self.session.get_mut().take() {
            warn!("Scanner dropped with session {} active", active.core.id());
            active.core.close();
            active.task.abort();

            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let stream = active.stream;
                    handle.spawn(async move { stream.stop().await });
                }
                Err(_) => warn!("No runtime to release the camera on"),
            }
        }
    }
}
