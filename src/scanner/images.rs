use crate::image::EncodedImage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct ImageSlots {
    decoded_format: Option<String>,
    last_decoded: Option<Arc<str>>,
    last_capture: Option<Arc<str>>,
}

/// Encoded images kept for the host: the frame of the last successful decode
/// and the last still capture. Both are data URLs held in shared buffers.
#[derive(Debug, Default)]
pub(crate) struct ImageStore {
    slots: RwLock<ImageSlots>,
}

impl ImageStore {
    pub(crate) fn new(decoded_format: Option<String>) -> Self {
        Self {
            slots: RwLock::new(ImageSlots {
                decoded_format,
                ..ImageSlots::default()
            }),
        }
    }

    pub(crate) fn decoded_format(&self) -> Option<String> {
        self.slots.read().decoded_format.clone()
    }

    /// Change the format; any retained decoded frame is discarded
    pub(crate) fn set_decoded_format(&self, format: Option<String>) {
        let mut slots = self.slots.write();
        slots.decoded_format = format.filter(|f| !f.is_empty());
        slots.last_decoded = None;
        debug!("Decoded frame format set to {:?}", slots.decoded_format);
    }

    /// Keep `image` unless the format was changed while it was rendered
    pub(crate) fn store_decoded(&self, format: &str, image: &EncodedImage) {
        let mut slots = self.slots.write();
        if slots.decoded_format.as_deref() == Some(format) {
            slots.last_decoded = Some(image.to_shared_data_url());
        }
    }

    pub(crate) fn last_decoded(&self) -> Option<Arc<str>> {
        self.slots.read().last_decoded.clone()
    }

    pub(crate) fn store_capture(&self, url: Option<Arc<str>>) {
        self.slots.write().last_capture = url;
    }

    pub(crate) fn last_capture(&self) -> Option<Arc<str>> {
        self.slots.read().last_capture.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_store_ignores_frames() {
        let store = ImageStore::new(None);
        store.store_decoded("image/png", &EncodedImage::new("image/png", vec![1]));
        assert!(store.last_decoded().is_none());
    }

    #[test]
    fn test_format_change_discards_frame() {
        let store = ImageStore::new(Some("image/png".to_string()));
        store.store_decoded("image/png", &EncodedImage::new("image/png", vec![1, 2]));
        assert!(store.last_decoded().is_some());

        store.set_decoded_format(Some("image/webp".to_string()));
        assert!(store.last_decoded().is_none());

        // A frame rendered under the old format arrives late
        store.store_decoded("image/png", &EncodedImage::new("image/png", vec![3]));
        assert!(store.last_decoded().is_none());
    }

    #[test]
    fn test_empty_format_disables() {
        let store = ImageStore::new(None);
        store.set_decoded_format(Some(String::new()));
        assert_eq!(store.decoded_format(), None);
    }
}
