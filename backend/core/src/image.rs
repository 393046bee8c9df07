use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::ImageDimensions;

/// Identity of an uploaded image. A new upload always gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The image the conversation is currently about.
///
/// Cheap to clone: the encoded bytes are shared.
#[derive(Debug, Clone)]
pub struct ActiveImage {
    pub id: ImageId,
    pub dimensions: ImageDimensions,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl ActiveImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>, dimensions: ImageDimensions) -> Self {
        Self {
            id: ImageId::new(),
            dimensions,
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form used by chat-completion style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_upload_gets_a_fresh_id() {
        let a = ActiveImage::new(vec![1u8, 2, 3], "image/png", ImageDimensions::new(2, 2));
        let b = ActiveImage::new(vec![1u8, 2, 3], "image/png", ImageDimensions::new(2, 2));
        assert_ne!(a.id, b.id);
        assert_eq!(a.clone().id, a.id);
    }

    #[test]
    fn test_data_url() {
        let img = ActiveImage::new(vec![0xffu8, 0xd8], "image/jpeg", ImageDimensions::new(1, 1));
        assert_eq!(img.data_url(), "data:image/jpeg;base64,/9g=");
    }
}
