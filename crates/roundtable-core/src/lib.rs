//! Core trait and types for the Roundtable multi-character chat.
//!
//! This crate provides the shared interface used by every other crate in
//! the workspace. It defines:
//!
//! - [`Gateway`] - The trait that language model backends implement
//! - [`GenerateRequest`] / [`ImagePayload`] - Input to a gateway call
//! - [`GatewayError`] - The failure taxonomy for gateway calls
//! - [`Character`] / [`Message`] / [`Room`] - The room data model
//!
//! # Example
//!
//! ```rust
//! use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest};
//!
//! struct Parrot;
//!
//! #[async_trait]
//! impl Gateway for Parrot {
//!     async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
//!         Ok(request.prompt().to_string())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Parrot"
//!     }
//! }
//! ```

mod error;
mod gateway;
mod model;
mod prompt;

pub use error::{ErrorKind, GatewayError, RoomError};
pub use gateway::{Gateway, GenerateRequest, ImagePayload, TextStream, DEFAULT_IMAGE_MIME};
pub use model::{Character, Message, MessageRole, Room};
pub use prompt::{fill_template, hash_prompt};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
