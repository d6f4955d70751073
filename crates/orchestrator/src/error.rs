//! Error types for orchestrator operations.

use roundtable_core::GatewayError;
use thiserror::Error;

use crate::decision::MalformedDecision;

/// Errors that can occur during orchestration.
///
/// Only `InvalidRequest` and `NoCharacters` leave [`crate::Orchestrator::handle_turn`].
/// The other variants come from the primary stage of a two-stage operation
/// and are absorbed by its fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The turn request is unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The roster is empty, so nobody can answer.
    #[error("no characters available to respond")]
    NoCharacters,

    /// The director model answered with something that is not a decision.
    #[error("malformed director decision: {0}")]
    MalformedDecision(#[from] MalformedDecision),

    /// The gateway call behind a primary stage failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
