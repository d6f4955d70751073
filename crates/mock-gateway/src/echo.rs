//! Echo gateway implementation - echoes prompts back.

use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest};

/// A simple gateway that echoes the prompt back.
///
/// Useful for testing prompt construction without any model.
#[derive(Debug, Clone, Default)]
pub struct EchoGateway {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoGateway {
    /// Create a new EchoGateway with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoGateway with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_gateway::EchoGateway;
    ///
    /// let gateway = EchoGateway::with_prefix("Echo: ");
    /// // Will respond with "Echo: <prompt>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Gateway for EchoGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
        let text = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, request.prompt()),
            None => request.prompt().to_string(),
        };
        Ok(text)
    }

    fn name(&self) -> &str {
        "EchoGateway"
    }
}
