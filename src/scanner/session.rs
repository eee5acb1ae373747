use super::images::ImageStore;
use crate::debounce::ScanDebouncer;
use crate::decode::DecodeAttempt;
use crate::events::EventDispatcher;
use crate::platform::MediaStream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Decoding session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// State owned by one decoding session
pub(crate) struct SessionCore {
    id: Uuid,
    token: CancellationToken,
    debouncer: Mutex<ScanDebouncer>,
    dispatcher: Arc<EventDispatcher>,
    images: Arc<ImageStore>,
    stream: Arc<dyn MediaStream>,
    attempts: AtomicU64,
}

impl SessionCore {
    pub(crate) fn new(
        dispatcher: Arc<EventDispatcher>,
        images: Arc<ImageStore>,
        stream: Arc<dyn MediaStream>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            debouncer: Mutex::new(ScanDebouncer::new()),
            dispatcher,
            images,
            stream,
            attempts: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Stop accepting attempts and drop the debounce state. Waits for an
    /// attempt being dispatched to finish, so nothing is delivered after this
    /// returns.
    pub(crate) fn close(&self) {
        let mut debouncer = self.debouncer.lock();
        self.token.cancel();
        debouncer.reset();
        debug!(
            "Session {} closed after {} attempts",
            self.id,
            self.attempt_count()
        );
    }
}

/// Handle through which a decoder engine reports attempts for one session.
///
/// Cloning is cheap; all clones refer to the same session. Once the session
/// is stopped every delivery is refused.
#[derive(Clone)]
pub struct AttemptSink {
    core: Arc<SessionCore>,
}

impl AttemptSink {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    pub fn session_id(&self) -> Uuid {
        self.core.id
    }

    pub fn is_closed(&self) -> bool {
        self.core.token.is_cancelled()
    }

    /// Resolves when the session stops
    pub async fn closed(&self) {
        self.core.token.cancelled().await
    }

    /// Process one attempt. Returns false when the session no longer accepts
    /// attempts, in which case the engine should end its loop.
    pub async fn deliver(&self, attempt: DecodeAttempt) -> bool {
        if self.is_closed() {
            return false;
        }

        // Frame rendering is async, so do it before taking the dispatch lock
        let frame = match (attempt.found_payload(), self.core.images.decoded_format()) {
            (Some(_), Some(format)) => match self.core.stream.render_frame(&format).await {
                Ok(image) => Some((format, image)),
                Err(e) => {
                    warn!("Failed to render decoded frame as {}: {}", format, e);
                    None
                }
            },
            _ => None,
        };

        let mut debouncer = self.core.debouncer.lock();
        if self.is_closed() {
            return false;
        }
        let n = self.core.attempts.fetch_add(1, Ordering::Relaxed);
        trace!("Session {} attempt {}: {:?}", self.core.id, n, attempt.outcome);

        if let Some((format, image)) = frame {
            self.core.images.store_decoded(&format, &image);
        }
        if let Some(event) = debouncer.on_decode_attempt(&attempt) {
            self.core.dispatcher.dispatch(event);
        }
        true
    }
}

/// A running session and the task driving its decoder
pub(crate) struct ActiveSession {
    pub(crate) core: Arc<SessionCore>,
    pub(crate) stream: Arc<dyn MediaStream>,
    pub(crate) task: JoinHandle<()>,
}
