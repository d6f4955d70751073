//! Google Gemini gateway implementation.
//!
//! This crate provides a [`Gateway`] implementation backed by the Gemini
//! REST API.
//!
//! # Features
//!
//! - Uses Gemini 2.5 Flash by default
//! - Optional inline image (any `image/*` type, base64 on the wire)
//! - Safety settings at `BLOCK_NONE` for every harm category
//! - Streaming via `streamGenerateContent` Server-Sent Events
//! - Bounded per-call timeout, no retries
//! - Configurable via environment variables
//!
//! # Usage
//!
//! ```rust,no_run
//! use gemini_gateway::{Gateway, GeminiGateway, GenerateRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = GeminiGateway::from_env()?;
//!     let text = gateway.generate(GenerateRequest::new("Say hello")?).await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

mod api_types;
mod config;
mod gateway;
mod stream;

pub use config::{GeminiConfig, GeminiConfigBuilder, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
pub use gateway::GeminiGateway;
pub use stream::GeminiStream;

// Re-export roundtable-core types for convenience
pub use roundtable_core::{
    async_trait, Gateway, GatewayError, GenerateRequest, ImagePayload, TextStream,
};
