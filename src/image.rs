use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

/// Encoded image bytes as produced by the platform (JPEG, PNG, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        let mut url = String::with_capacity(self.mime.len() + 13 + self.bytes.len() * 4 / 3 + 4);
        url.push_str("data:");
        url.push_str(&self.mime);
        url.push_str(";base64,");
        STANDARD.encode_string(&self.bytes, &mut url);
        url
    }

    /// Data URL in a shared buffer, handed out without further copies
    pub fn to_shared_data_url(&self) -> Arc<str> {
        Arc::from(self.to_data_url())
    }

    /// Parse a base64 data URL back into bytes
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        let bytes = STANDARD.decode(payload).ok()?;
        Some(Self::new(mime, bytes))
    }
}
