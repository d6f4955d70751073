//! Mock gateway implementations for testing response routing.
//!
//! This crate provides mock implementations of the `Gateway` trait:
//! - `EchoGateway` - Echoes the prompt back
//! - `ScriptedGateway` - Answers by prompt substring and records every call
//! - `ChunkedGateway` - Streams fixed fragments and counts what was pulled
//! - `DelayedGateway` - Wraps another gateway with artificial delay
//!
//! For real generation, use the `gemini-gateway` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_gateway::{Gateway, GatewayError, GenerateRequest, ScriptedGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GatewayError> {
//!     let gateway = ScriptedGateway::replying("Elementary.")
//!         .fail_on("Einstein", GatewayError::EmptyResponse);
//!
//!     let text = gateway.generate(GenerateRequest::new("You are Holmes")?).await?;
//!     assert_eq!(text, "Elementary.");
//!     assert_eq!(gateway.calls(), 1);
//!     Ok(())
//! }
//! ```

mod chunked;
mod delayed;
mod echo;
mod scripted;

// Re-export roundtable-core types for convenience
pub use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest, ImagePayload, TextStream};

// Export mock implementations
pub use chunked::ChunkedGateway;
pub use delayed::DelayedGateway;
pub use echo::EchoGateway;
pub use scripted::{RecordedCall, ScriptedGateway};
