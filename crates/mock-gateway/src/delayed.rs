//! Delayed gateway implementation - wraps another gateway with artificial delay.

use std::time::Duration;

use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest, TextStream};
use tokio::time::sleep;

/// A gateway that wraps another gateway and adds artificial delay.
///
/// Useful for testing timeout handling and simulating model latency.
pub struct DelayedGateway<G: Gateway> {
    inner: G,
    delay: Duration,
}

impl<G: Gateway> DelayedGateway<G> {
    /// Create a new DelayedGateway wrapping the given gateway with the specified delay.
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a gateway with a delay in milliseconds.
    pub fn with_millis(inner: G, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// The wrapped gateway.
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: Gateway> Gateway for DelayedGateway<G> {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
        sleep(self.delay).await;
        self.inner.generate(request).await
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream, GatewayError> {
        sleep(self.delay).await;
        self.inner.generate_stream(request).await
    }

    fn name(&self) -> &str {
        "DelayedGateway"
    }

    async fn validate(&self) -> bool {
        self.inner.validate().await
    }
}
