mod builder;
mod images;
mod interface;
mod session;

pub use builder::BarcodeScannerBuilder;
pub use interface::BarcodeScanner;
pub use session::{AttemptSink, SessionState};
