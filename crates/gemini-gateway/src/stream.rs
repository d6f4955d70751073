//! Server-Sent Events stream of Gemini text fragments.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use reqwest_eventsource::{Error as SseError, Event, EventSource};
use roundtable_core::GatewayError;
use tracing::{debug, warn};

use crate::api_types::GenerateContentResponse;
use crate::gateway::status_error;

/// A stream of text fragments from `streamGenerateContent`.
///
/// Fragments are read from the connection only when the stream is polled.
/// The first error closes the event source, so a failed stream is never
/// reconnected. Dropping the stream closes the connection.
pub struct GeminiStream {
    event_source: EventSource,
    /// Error body still being read after a non-success status.
    status_failure: Option<Pin<Box<dyn Future<Output = GatewayError> + Send>>>,
    done: bool,
    emitted: bool,
}

impl GeminiStream {
    pub(crate) fn new(event_source: EventSource) -> Self {
        Self {
            event_source,
            status_failure: None,
            done: false,
            emitted: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.event_source.close();
    }

    fn fail(&mut self, error: GatewayError) -> Poll<Option<Result<String, GatewayError>>> {
        self.finish();
        Poll::Ready(Some(Err(error)))
    }

    fn end(&mut self) -> Poll<Option<Result<String, GatewayError>>> {
        self.finish();
        if self.emitted {
            Poll::Ready(None)
        } else {
            Poll::Ready(Some(Err(GatewayError::EmptyResponse)))
        }
    }
}

impl Stream for GeminiStream {
    type Item = Result<String, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(failure) = self.status_failure.as_mut() {
            let error = match failure.as_mut().poll(cx) {
                Poll::Ready(error) => error,
                Poll::Pending => return Poll::Pending,
            };
            self.status_failure = None;
            return self.fail(error);
        }

        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.event_source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    debug!("Gemini stream opened");
                    continue;
                }
                Poll::Ready(Some(Ok(Event::Message(msg)))) => {
                    let chunk = match serde_json::from_str::<GenerateContentResponse>(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(error = %e, "GEMINI_STREAM_PARSE_FAILED");
                            return self.fail(GatewayError::transport(format!(
                                "unparseable stream chunk: {}",
                                e
                            )));
                        }
                    };

                    if let Some(reason) = chunk.block_reason() {
                        return self.fail(GatewayError::Blocked(reason.to_string()));
                    }

                    let text = chunk.text();
                    if text.is_empty() {
                        continue;
                    }

                    self.emitted = true;
                    return Poll::Ready(Some(Ok(text)));
                }
                Poll::Ready(Some(Err(SseError::StreamEnded))) | Poll::Ready(None) => {
                    debug!("Gemini stream ended");
                    return self.end();
                }
                Poll::Ready(Some(Err(SseError::InvalidStatusCode(status, response)))) => {
                    warn!(status = status.as_u16(), "GEMINI_STREAM_STATUS");
                    self.event_source.close();
                    self.status_failure = Some(Box::pin(async move {
                        let body = response.text().await.unwrap_or_default();
                        status_error(status.as_u16(), &body)
                    }));
                    return self.poll_next(cx);
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(error = %e, "GEMINI_STREAM_ERROR");
                    return self.fail(GatewayError::transport(e));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
