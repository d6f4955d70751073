//! Response routing for multi-character chat.
//!
//! This crate provides the [`Orchestrator`] type, which answers one user
//! turn in a room of AI characters:
//!
//! - [`Director`] decides whether one character or several answer, and which
//! - [`CharacterResponder`] builds persona prompts and calls the gateway
//! - [`Orchestrator`] runs the director, then the selected characters
//!
//! Every operation that calls a [`roundtable_core::Gateway`] is a two-stage
//! pipeline: a primary stage that may fail (`try_decide`, `try_respond`) and
//! a fallback stage that never calls out (`fallback_decision`,
//! `fallback_reply`). Gateway failures never reach the caller as errors.
//!
//! # Architecture
//!
//! ```text
//! TurnRequest (roomId, userMessage/imageData, characters, messages, replyTo)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Validate the turn                                       │
//! │         ↓                                                   │
//! │  2. Director                                                │
//! │     • reply to a character → that character, no model call  │
//! │     • otherwise ask the model for a JSON decision           │
//! │     • unusable answer → keyword fallback                    │
//! │         ↓                                                   │
//! │  3. Responder, concurrently for each selected character     │
//! │     • text turn → persona prompt, canned reply on failure   │
//! │     • image turn → image prompt, apology on failure         │
//! │         ↓                                                   │
//! │  4. TurnReply (responses in roster order + decision)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gemini_gateway::GeminiGateway;
//! use orchestrator::{Orchestrator, TurnRequest};
//! use roundtable_core::Character;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Arc::new(GeminiGateway::from_env()?);
//!     let orchestrator = Orchestrator::from_env(gateway);
//!
//!     let characters = vec![
//!         Character::new("holmes", "Sherlock Holmes", "a consulting detective"),
//!         Character::new("einstein", "Albert Einstein", "a theoretical physicist"),
//!     ];
//!     let request = TurnRequest::new("room_1", "What do you all think about gravity?", characters);
//!     let reply = orchestrator.handle_turn(&request).await?;
//!
//!     for response in reply.responses {
//!         println!("{}: {}", response.character_name, response.content);
//!     }
//!     Ok(())
//! }
//! ```

mod context;
mod decision;
mod director;
mod error;
mod orchestrator;
mod responder;

pub use context::{ReplyContext, Transcript, MAX_SNAPSHOT_CHARS, NO_RECENT_MESSAGES};
pub use decision::{parse_decision, DirectorDecision, MalformedDecision, ParsedDecision};
pub use director::{
    fallback_decision, is_group_message, load_director_prompt, Director, DirectorConfig,
    DEFAULT_DIRECTOR_PROMPT, DEFAULT_DIRECTOR_PROMPT_FILE, DEFAULT_DIRECTOR_WINDOW,
};
pub use error::OrchestratorError;
pub use orchestrator::{
    DecisionSummary, Orchestrator, ResponseEntry, TurnReply, TurnRequest, IMAGE_ONLY_PROMPT,
};
pub use responder::{
    fallback_reply, CharacterReply, CharacterResponder, ResponderConfig, DEFAULT_CALL_TIMEOUT,
    DEFAULT_HISTORY_WINDOW, IMAGE_APOLOGY,
};
