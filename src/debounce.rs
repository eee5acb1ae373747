//! Turns the per-frame decode stream into presence-change events.
//!
//! A code held in front of the camera yields one `BarcodeFound` when it
//! appears and one `BarcodeLost` when a frame reports nothing, regardless of
//! frame rate. Suppression is value based only; there is no time window.
//! Content equality ignores the symbology tag.

use crate::decode::{DecodeAttempt, DecodeOutcome};
use crate::events::{BarcodeFoundEvent, ScanEvent};
use chrono::Utc;
use tracing::trace;

/// Per-session debounce state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanState {
    last_content: Option<String>,
}

impl ScanState {
    /// Content of the code currently considered in view
    pub fn last_content(&self) -> Option<&str> {
        self.last_content.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.last_content.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ScanDebouncer {
    state: ScanState,
}

impl ScanDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Feed one attempt; returns the event to announce, if any.
    /// Errors are passed through on every attempt and never touch the state.
    pub fn on_decode_attempt(&mut self, attempt: &DecodeAttempt) -> Option<ScanEvent> {
        match &attempt.outcome {
            DecodeOutcome::Found { payload } => {
                if payload.content.is_empty() {
                    trace!("Ignoring found attempt with empty content");
                    return None;
                }
                if self.state.last_content.as_deref() == Some(payload.content.as_str()) {
                    return None;
                }
                self.state.last_content = Some(payload.content.clone());
                Some(ScanEvent::BarcodeFound(BarcodeFoundEvent {
                    content: payload.content.clone(),
                    format: payload.format.clone(),
                    timestamp: Utc::now(),
                }))
            }
            DecodeOutcome::NotFound => self
                .state
                .last_content
                .take()
                .map(|_| ScanEvent::BarcodeLost),
            DecodeOutcome::Error { detail } => Some(ScanEvent::DecodeError {
                detail: detail.clone(),
            }),
        }
    }

    pub fn reset(&mut self) {
        if let Some(content) = self.state.last_content.take() {
            trace!("Debounce state reset, dropping '{}'", content);
        }
    }
}
