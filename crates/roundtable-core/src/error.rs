//! Error types for gateway calls and room mutations.

use thiserror::Error;

/// Errors that can occur while calling a language model gateway.
///
/// The `String` payloads carry provider detail for logs only. Anything shown
/// to a user goes through [`GatewayError::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The gateway has no usable credential.
    #[error("gateway not configured: {0}")]
    Configuration(String),

    /// The provider refused the request on policy grounds.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// The provider answered without any text.
    #[error("empty response received")]
    EmptyResponse,

    /// Network, timeout, or backend failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request itself was unusable (blank prompt, bad image).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The canned categories a gateway failure is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Blocked,
    EmptyResponse,
    Transport,
}

impl ErrorKind {
    /// Short label used as the error marker on failed replies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Blocked => "Content policy restriction",
            Self::EmptyResponse => "Empty response",
            Self::Transport => "Service unavailable",
        }
    }
}

impl GatewayError {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// The category this error is reported under.
    ///
    /// Invalid requests share the transport wording: the user cannot fix
    /// them by rephrasing.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Blocked(_) => ErrorKind::Blocked,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::Transport(_) | Self::InvalidRequest(_) => ErrorKind::Transport,
        }
    }

    /// User-safe text for this failure. Never includes provider detail.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => {
                "I'm not able to think right now because the assistant isn't configured. Please try again later."
            }
            ErrorKind::Blocked => {
                "I apologize, but I cannot respond to that request due to content policy restrictions. Please try rephrasing your question."
            }
            ErrorKind::EmptyResponse => {
                "I apologize, but I received an empty response. Please try asking something else."
            }
            ErrorKind::Transport => {
                "I'm having trouble gathering my thoughts right now. Please try again in a moment."
            }
        }
    }
}

/// Errors that can occur when mutating a [`crate::Room`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// An assistant message names a character that is not in the roster.
    #[error("character {0} is not a member of this room")]
    UnknownCharacter(String),

    /// The message role and its character id disagree.
    #[error("invalid message author: {0}")]
    InvalidAuthor(String),

    /// A message with this id already exists.
    #[error("duplicate message id: {0}")]
    DuplicateMessage(String),
}
