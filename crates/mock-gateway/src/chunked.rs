//! Chunked gateway implementation - streams fixed fragments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest, TextStream};

/// A gateway that streams a fixed list of fragments.
///
/// Counts how many fragments consumers actually pulled, so tests can check
/// that streams are read lazily.
#[derive(Debug, Clone)]
pub struct ChunkedGateway {
    fragments: Vec<String>,
    trailing_error: Option<GatewayError>,
    pulled: Arc<AtomicUsize>,
}

impl ChunkedGateway {
    /// Create a gateway that streams `fragments` in order.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            trailing_error: None,
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Yield `error` after the last fragment.
    pub fn then_fail(mut self, error: GatewayError) -> Self {
        self.trailing_error = Some(error);
        self
    }

    /// Number of stream items pulled so far, across all streams.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for ChunkedGateway {
    async fn generate(&self, _request: GenerateRequest) -> Result<String, GatewayError> {
        if let Some(error) = &self.trailing_error {
            return Err(error.clone());
        }
        Ok(self.fragments.concat())
    }

    async fn generate_stream(&self, _request: GenerateRequest) -> Result<TextStream, GatewayError> {
        let mut items: Vec<Result<String, GatewayError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.trailing_error {
            items.push(Err(error.clone()));
        }

        let pulled = Arc::clone(&self.pulled);
        let stream = stream::iter(items).map(move |item| {
            pulled.fetch_add(1, Ordering::SeqCst);
            item
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "ChunkedGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest::new("stream please").unwrap()
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let gateway = ChunkedGateway::new(["Ele", "men", "tary."]);
        let chunks: Vec<_> = gateway.generate_stream(request()).await.unwrap().collect().await;
        assert_eq!(
            chunks,
            vec![Ok("Ele".to_string()), Ok("men".to_string()), Ok("tary.".to_string())]
        );
        assert_eq!(gateway.generate(request()).await.unwrap(), "Elementary.");
    }

    #[tokio::test]
    async fn test_stream_is_pulled_lazily() {
        let gateway = ChunkedGateway::new(["a", "b", "c", "d"]);
        let mut stream = gateway.generate_stream(request()).await.unwrap();
        assert_eq!(gateway.pulled(), 0);

        assert_eq!(stream.next().await, Some(Ok("a".to_string())));
        assert_eq!(gateway.pulled(), 1);

        drop(stream);
        assert_eq!(gateway.pulled(), 1);
    }

    #[tokio::test]
    async fn test_trailing_error() {
        let gateway = ChunkedGateway::new(["partial"]).then_fail(GatewayError::transport("reset"));
        let chunks: Vec<_> = gateway.generate_stream(request()).await.unwrap().collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], Err(GatewayError::Transport(_))));
        assert!(gateway.generate(request()).await.is_err());
    }
}
