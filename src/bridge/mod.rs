//! JSON request/notification protocol between a host and a [`BarcodeScanner`].
//!
//! Requests are `{"method": <name>, "params": {..}}`, responses
//! `{"ok": bool, "result"?: .., "error"?: {"kind", "message"}}`, and events
//! are pushed as `{"event": <name>, "payload"?: ..}`.
//!
//! [`BarcodeScanner`]: crate::scanner::BarcodeScanner

mod dispatch;
mod protocol;
mod serve;

pub use dispatch::{Bridge, NotificationStream};
pub use serve::serve_lines;
pub use protocol::{BridgeFault, BridgeNotification, BridgeRequest, BridgeResponse};
