//! The Gateway trait and its request types.

use std::pin::Pin;

use async_trait::async_trait;
use base64::Engine;
use futures::stream::{self, Stream};

use crate::error::GatewayError;

/// MIME type assumed for bare base64 images.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// A lazy, finite stream of text fragments.
///
/// The stream is pulled by the consumer; dropping it stops any further
/// backend reads. An error item ends the stream.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Raster image attached to a generation request.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImagePayload {
    /// Create a payload from raw bytes and an `image/*` MIME type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, GatewayError> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(GatewayError::InvalidRequest(format!(
                "unsupported image type: {}",
                mime_type
            )));
        }
        if bytes.is_empty() {
            return Err(GatewayError::InvalidRequest("empty image".to_string()));
        }
        Ok(Self { bytes, mime_type })
    }

    /// Decode an image from a bare base64 string or a `data:` URL.
    ///
    /// Bare base64 is assumed to be [`DEFAULT_IMAGE_MIME`].
    pub fn from_base64(data: &str) -> Result<Self, GatewayError> {
        let data = data.trim();
        let (mime_type, encoded) = match data.strip_prefix("data:") {
            Some(rest) => {
                let (header, encoded) = rest.split_once(',').ok_or_else(|| {
                    GatewayError::InvalidRequest("malformed data URL".to_string())
                })?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    GatewayError::InvalidRequest("data URL is not base64 encoded".to_string())
                })?;
                (mime, encoded)
            }
            None => (DEFAULT_IMAGE_MIME, data),
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid base64 image: {}", e)))?;

        Self::new(bytes, mime_type)
    }

    /// The image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The image MIME type, lowercased.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 encoding of the bytes, for transport.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// A single generation request: a prompt and an optional image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    prompt: String,
    image: Option<ImagePayload>,
}

impl GenerateRequest {
    /// Create a text-only request. Blank prompts are rejected.
    pub fn new(prompt: impl Into<String>) -> Result<Self, GatewayError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("prompt is empty".to_string()));
        }
        Ok(Self {
            prompt,
            image: None,
        })
    }

    /// Attach an image to the request.
    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }

    /// The prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The attached image, if any.
    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }
}

/// A generative text backend.
///
/// Implementations are constructed explicitly and shared behind an `Arc`.
/// This trait is object-safe and can be used as `Arc<dyn Gateway>`.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Generate a complete text response for the request.
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError>;

    /// Generate a response as a stream of text fragments.
    ///
    /// Default implementation yields the full [`Gateway::generate`] result
    /// as a single fragment.
    async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream, GatewayError> {
        let text = self.generate(request).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }

    /// Get a human-readable name for this gateway implementation.
    fn name(&self) -> &str;

    /// Check whether the backend answers a trivial prompt.
    async fn validate(&self) -> bool {
        match GenerateRequest::new("Hello") {
            Ok(request) => self.generate(request).await.is_ok(),
            Err(_) => false,
        }
    }
}
