//! GeminiGateway implementation using the Gemini REST API.

use reqwest::Client;
use reqwest_eventsource::RequestBuilderExt;
use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest, TextStream};
use tracing::{debug, info, warn};

use crate::api_types::{
    ApiError, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, Part, SafetySetting,
};
use crate::config::GeminiConfig;
use crate::stream::GeminiStream;

/// Header carrying the API key (keeps it out of request URLs and logs).
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A gateway that sends single-turn prompts to Google Gemini.
///
/// Safety settings are fixed at `BLOCK_NONE` for every harm category.
/// Keeping replies family-friendly is left to the persona prompts.
pub struct GeminiGateway {
    client: Client,
    stream_client: Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    /// Create a new GeminiGateway with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        // Streams are long-lived: bound the connect, not the whole body
        let stream_client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("Failed to create stream client: {}", e))
            })?;

        if config.has_credential() {
            info!(
                "GeminiGateway initialized with model: {}, timeout: {:?}",
                config.model, config.timeout
            );
        } else {
            warn!("GeminiGateway has no API key; every call will use fallback content");
        }

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    /// Create a GeminiGateway from environment variables.
    ///
    /// See [`GeminiConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GeminiConfig::from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        if self.config.has_credential() {
            Ok(&self.config.api_key)
        } else {
            Err(GatewayError::Configuration(
                "GOOGLE_GENAI_API_KEY is not configured".to_string(),
            ))
        }
    }

    /// Build the request body: image part first (if any), then the prompt.
    fn build_body(&self, request: &GenerateRequest) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);

        if let Some(image) = request.image() {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type().to_string(),
                    data: image.to_base64(),
                },
            });
        }

        parts.push(Part::Text {
            text: request.prompt().to_string(),
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            safety_settings: SafetySetting::block_none_for_all(),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

/// Map a non-success HTTP status and its body to a gateway error.
pub(crate) fn status_error(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    if message.contains("PROHIBITED_CONTENT") || message.to_lowercase().contains("blocked") {
        return GatewayError::Blocked(message);
    }

    match status {
        401 | 403 => GatewayError::Configuration(format!("credential rejected ({})", status)),
        _ => GatewayError::Transport(format!("API error ({}): {}", status, message)),
    }
}

/// Turn a complete response into text or a typed error.
pub(crate) fn interpret_response(response: &GenerateContentResponse) -> Result<String, GatewayError> {
    if let Some(reason) = response.block_reason() {
        return Err(GatewayError::Blocked(reason.to_string()));
    }

    let text = response.text();
    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }

    Ok(text)
}

#[async_trait]
impl Gateway for GeminiGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
        let api_key = self.api_key()?;
        let body = self.build_body(&request);

        debug!(
            model = %self.config.model,
            prompt_len = request.prompt().len(),
            has_image = request.image().is_some(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error = status_error(status.as_u16(), &error_text);
            warn!(status = status.as_u16(), error = %error, "GEMINI_API_ERROR");
            return Err(error);
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to parse response: {}", e)))?;

        if let Some(ref usage) = completion.usage_metadata {
            debug!(
                "Token usage - prompt: {:?}, candidates: {:?}, total: {:?}",
                usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
            );
        }

        interpret_response(&completion)
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream, GatewayError> {
        let api_key = self.api_key()?;
        let body = self.build_body(&request);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));

        debug!(model = %self.config.model, "Opening streamGenerateContent");

        let event_source = self
            .stream_client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .eventsource()
            .map_err(|e| GatewayError::Transport(format!("Failed to open stream: {}", e)))?;

        Ok(Box::pin(GeminiStream::new(event_source)))
    }

    fn name(&self) -> &str {
        "GeminiGateway"
    }

    async fn validate(&self) -> bool {
        if !self.config.has_credential() {
            return false;
        }
        match GenerateRequest::new("Hello") {
            Ok(request) => self.generate(request).await.is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::ImagePayload;

    fn gateway(key: &str) -> GeminiGateway {
        let config = GeminiConfig::builder()
            .api_key(key)
            .api_url("http://localhost:1/")
            .build();
        GeminiGateway::new(config).unwrap()
    }

    #[test]
    fn test_endpoint() {
        let gateway = gateway("k");
        assert_eq!(
            gateway.endpoint("generateContent"),
            "http://localhost:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_build_body_text_only() {
        let gateway = gateway("k");
        let request = GenerateRequest::new("Hi there").unwrap();
        let json = serde_json::to_value(gateway.build_body(&request)).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["text"], "Hi there");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_build_body_with_image_puts_image_first() {
        let gateway = gateway("k");
        let image = ImagePayload::new(vec![0xff, 0xd8, 0xff], "image/webp").unwrap();
        let request = GenerateRequest::new("What is this?").unwrap().with_image(image);
        let json = serde_json::to_value(gateway.build_body(&request)).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/");
        assert_eq!(parts[1]["text"], "What is this?");
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let gateway = gateway("");
        let request = GenerateRequest::new("Hello").unwrap();

        let err = gateway.generate(request.clone()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));

        let err = gateway.generate_stream(request).await.err().unwrap();
        assert!(matches!(err, GatewayError::Configuration(_)));

        assert!(!gateway.validate().await);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(401, ""), GatewayError::Configuration(_)));
        assert!(matches!(status_error(403, "{}"), GatewayError::Configuration(_)));
        assert!(matches!(status_error(503, "overloaded"), GatewayError::Transport(_)));

        let body = r#"{"error": {"code": 400, "message": "Request blocked by safety filters", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(status_error(400, body), GatewayError::Blocked(_)));

        let body = r#"{"error": {"code": 500, "message": "Internal error", "status": "INTERNAL"}}"#;
        match status_error(500, body) {
            GatewayError::Transport(msg) => assert!(msg.contains("Internal error")),
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_response() {
        let ok: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "Elementary."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(interpret_response(&ok).unwrap(), "Elementary.");

        let empty: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}}]}"#)
                .unwrap();
        assert_eq!(interpret_response(&empty), Err(GatewayError::EmptyResponse));

        let none = GenerateContentResponse::default();
        assert_eq!(interpret_response(&none), Err(GatewayError::EmptyResponse));

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(
            interpret_response(&blocked),
            Err(GatewayError::Blocked(_))
        ));
    }

    #[test]
    fn test_gateway_name() {
        assert_eq!(gateway("k").name(), "GeminiGateway");
    }
}
