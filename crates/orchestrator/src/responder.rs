//! Persona-conditioned reply generation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use roundtable_core::{
    fill_template, Character, Gateway, GatewayError, GenerateRequest, ImagePayload, MessageRole,
    TextStream,
};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::context::{generate_text, join_lines, line_content, ReplyContext, Transcript};

/// Default number of history messages shown to a character.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default deadline for a single gateway call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

/// Reply used when an image turn cannot be answered.
pub const IMAGE_APOLOGY: &str = "Sorry, I encountered an error processing your request.";

const CHARACTER_PROMPT_TEMPLATE: &str = r#"You are {CHARACTER_NAME}, {CHARACTER_DESCRIPTION}

You are taking part in a group chat with other characters. Answer the user's message in character, keeping your own personality, expertise, and way of speaking.

Recent conversation:
{CONVERSATION_CONTEXT}
{REPLY_CONTEXT}
User's message: "{USER_MESSAGE}"

Guidelines:
1. Stay in character at all times
2. Draw on your own perspective and expertise
3. Keep the reply concise but informative
4. If the topic is outside your expertise, say so and suggest who might know better
5. Be engaging and conversational
6. Never break character or mention being an AI
7. Keep it family-friendly and educational

Respond naturally as {CHARACTER_NAME}:"#;

const IMAGE_PROMPT_TEMPLATE: &str = r#"You are {CHARACTER_NAME}, {CHARACTER_DESCRIPTION}

You are taking part in a group chat. The user has shared an image {AUDIENCE}. Look at the image and answer in character, keeping your own personality and expertise.

User's message: "{USER_MESSAGE}"

Guidelines:
1. Stay in character at all times
2. Look at the image from your own perspective
3. Use your expertise to offer insight about it
4. Keep the reply concise but informative
5. Be engaging and conversational
6. Never break character or mention being an AI

Respond naturally as {CHARACTER_NAME}:"#;

/// Settings for [`CharacterResponder`].
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// How many trailing history messages go into the prompt.
    pub history_window: usize,
    /// Deadline for each gateway call.
    pub call_timeout: Duration,
    /// Show other characters' lines, labeled with their names. When false a
    /// character only sees its own lines and the user's.
    pub shared_context: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shared_context: true,
        }
    }
}

/// One character's answer to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterReply {
    pub content: String,
    pub character_id: String,
    /// Canned failure category, set when the reply is not model output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CharacterReply {
    fn ok(character: &Character, content: String) -> Self {
        Self {
            content,
            character_id: character.id.clone(),
            error: None,
        }
    }

    fn failed(character: &Character, content: impl Into<String>, error: &GatewayError) -> Self {
        Self {
            content: content.into(),
            character_id: character.id.clone(),
            error: Some(error.kind().label().to_string()),
        }
    }
}

/// Generates in-character replies through a [`Gateway`].
///
/// Each operation runs a primary stage against the gateway and, where it
/// has one, a fallback stage that never calls out. Gateway errors do not
/// escape `respond`, `respond_all`, `should_respond`, `introduce`, or
/// `respond_to_image`.
pub struct CharacterResponder {
    gateway: Arc<dyn Gateway>,
    config: ResponderConfig,
}

impl CharacterResponder {
    /// Create a responder with default settings.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, ResponderConfig::default())
    }

    /// Create a responder with the given settings.
    pub fn with_config(gateway: Arc<dyn Gateway>, config: ResponderConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Build the persona prompt for a text turn.
    pub fn build_prompt(
        &self,
        character: &Character,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply: Option<&ReplyContext>,
    ) -> String {
        let context = self.render_history(character, transcript);
        let reply_line = reply
            .map(|r| format!("\n{}\n", r.render()))
            .unwrap_or_default();

        fill_template(
            CHARACTER_PROMPT_TEMPLATE,
            &[
                ("CHARACTER_NAME", &character.name),
                ("CHARACTER_DESCRIPTION", &character.description),
                ("CONVERSATION_CONTEXT", &context),
                ("REPLY_CONTEXT", &reply_line),
                ("USER_MESSAGE", user_message),
            ],
        )
    }

    fn render_history(&self, character: &Character, transcript: &Transcript<'_>) -> String {
        let lines = transcript
            .recent(self.config.history_window)
            .iter()
            .filter_map(|message| {
                let speaker = match message.role {
                    MessageRole::User => "User",
                    MessageRole::Director => "Director",
                    MessageRole::Assistant => {
                        let own = message.character_id.as_deref() == Some(character.id.as_str());
                        if own {
                            character.name.as_str()
                        } else if self.config.shared_context {
                            transcript.author_name(message)
                        } else {
                            return None;
                        }
                    }
                };
                Some(format!("{}: {}", speaker, line_content(message)))
            })
            .collect();

        join_lines(lines)
    }

    /// Primary stage: ask the gateway for the character's reply.
    pub async fn try_respond(
        &self,
        character: &Character,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply: Option<&ReplyContext>,
    ) -> Result<String, GatewayError> {
        let prompt = self.build_prompt(character, user_message, transcript, reply);
        debug!(character_id = %character.id, prompt_len = prompt.len(), "Generating character reply");
        generate_text(
            self.gateway.as_ref(),
            GenerateRequest::new(prompt)?,
            self.config.call_timeout,
        )
        .await
    }

    /// Reply as `character`, falling back to a canned reply on any failure.
    pub async fn respond(
        &self,
        character: &Character,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply: Option<&ReplyContext>,
    ) -> CharacterReply {
        match self.try_respond(character, user_message, transcript, reply).await {
            Ok(text) => CharacterReply::ok(character, text),
            Err(e) => {
                warn!(character_id = %character.id, error = %e, "CHARACTER_REPLY_FALLBACK");
                CharacterReply::ok(character, fallback_reply(character, user_message))
            }
        }
    }

    /// Ask every character concurrently and collect all outcomes.
    ///
    /// Returns one entry per input character, in input order. A failed
    /// character gets empty content and an error marker; no fallback text
    /// is substituted.
    pub async fn respond_all(
        &self,
        characters: &[Character],
        user_message: &str,
        transcript: &Transcript<'_>,
        reply: Option<&ReplyContext>,
    ) -> Vec<CharacterReply> {
        let attempts = characters
            .iter()
            .map(|character| self.try_respond(character, user_message, transcript, reply));

        join_all(attempts)
            .await
            .into_iter()
            .zip(characters)
            .map(|(result, character)| match result {
                Ok(text) => CharacterReply::ok(character, text),
                Err(e) => {
                    warn!(character_id = %character.id, error = %e, "COLLABORATIVE_REPLY_FAILED");
                    CharacterReply::failed(character, String::new(), &e)
                }
            })
            .collect()
    }

    /// Ask whether `character` wants to answer `message`.
    ///
    /// Only an exact "no" declines; unclear answers and failures accept.
    pub async fn should_respond(&self, character: &Character, message: &str) -> bool {
        let prompt = format!(
            "You are {}, {}\n\nThe user said: \"{}\"\n\nGiven your expertise and personality, should you answer this message? Consider whether the topic is within your expertise, whether you have a distinct perspective, and whether your answer would add value.\n\nRespond with ONLY \"yes\" or \"no\".",
            character.name, character.description, message
        );

        let answer = match GenerateRequest::new(prompt) {
            Ok(request) => {
                generate_text(self.gateway.as_ref(), request, self.config.call_timeout).await
            }
            Err(e) => Err(e),
        };

        match answer {
            Ok(text) => text.to_lowercase() != "no",
            Err(e) => {
                debug!(character_id = %character.id, error = %e, "Relevance probe failed, assuming yes");
                true
            }
        }
    }

    /// A short in-character introduction for when a character joins.
    pub async fn introduce(&self, character: &Character) -> String {
        let prompt = format!(
            "You are {}, {}\n\nWrite a brief, engaging introduction of yourself (1-2 sentences) to say as you join a conversation. Keep it natural and in character.\n\nIntroduction:",
            character.name, character.description
        );

        let result = match GenerateRequest::new(prompt) {
            Ok(request) => {
                generate_text(self.gateway.as_ref(), request, self.config.call_timeout).await
            }
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(character_id = %character.id, error = %e, "CHARACTER_INTRO_FALLBACK");
            greeting(character)
        })
    }

    /// Stream the character's reply. There is no fallback.
    ///
    /// The deadline covers opening the stream, not reading it.
    pub async fn respond_stream(
        &self,
        character: &Character,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply: Option<&ReplyContext>,
    ) -> Result<TextStream, GatewayError> {
        let prompt = self.build_prompt(character, user_message, transcript, reply);
        let request = GenerateRequest::new(prompt)?;
        timeout(self.config.call_timeout, self.gateway.generate_stream(request))
            .await
            .map_err(|_| GatewayError::transport("timed out opening reply stream"))?
    }

    /// Reply to an image turn.
    ///
    /// `broadcast` tells the character the whole room was asked. Failure
    /// yields [`IMAGE_APOLOGY`] with the error category recorded.
    pub async fn respond_to_image(
        &self,
        character: &Character,
        user_message: &str,
        image: &ImagePayload,
        broadcast: bool,
    ) -> CharacterReply {
        let audience = if broadcast {
            "and asked for everyone's opinion"
        } else {
            "with you"
        };
        let prompt = fill_template(
            IMAGE_PROMPT_TEMPLATE,
            &[
                ("CHARACTER_NAME", &character.name),
                ("CHARACTER_DESCRIPTION", &character.description),
                ("AUDIENCE", audience),
                ("USER_MESSAGE", user_message),
            ],
        );

        let result = match GenerateRequest::new(prompt) {
            Ok(request) => {
                let request = request.with_image(image.clone());
                generate_text(self.gateway.as_ref(), request, self.config.call_timeout).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => CharacterReply::ok(character, text),
            Err(e) => {
                warn!(character_id = %character.id, error = %e, "IMAGE_REPLY_FAILED");
                CharacterReply::failed(character, IMAGE_APOLOGY, &e)
            }
        }
    }
}

fn greeting(character: &Character) -> String {
    format!("Hello! I'm {}. {}", character.name, character.description)
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Fallback stage: a canned reply chosen from the message wording.
pub fn fallback_reply(character: &Character, user_message: &str) -> String {
    let lower = user_message.to_lowercase();

    if lower.contains("hello") || has_word(&lower, "hi") {
        return greeting(character);
    }

    if lower.contains("how are you") {
        return format!(
            "I'm doing well, thank you for asking! As {}, I'm always eager to share my knowledge and insights.",
            character.name
        );
    }

    if lower.contains("what do you think") || lower.contains("opinion") {
        return format!(
            "That's an interesting question! From my perspective as {}, I'd need to think about this more carefully. Could you provide more context?",
            character.name
        );
    }

    format!(
        "I appreciate your question! As {}, I find this topic quite fascinating. {} Perhaps we could explore this further?",
        character.name, character.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_gateway::{EchoGateway, ScriptedGateway};
    use roundtable_core::Message;

    fn holmes() -> Character {
        Character::new("holmes", "Sherlock Holmes", "a consulting detective")
    }

    fn einstein() -> Character {
        Character::new("einstein", "Albert Einstein", "a theoretical physicist")
    }

    fn responder(gateway: impl Gateway + 'static) -> CharacterResponder {
        CharacterResponder::new(Arc::new(gateway))
    }

    #[test]
    fn test_fallback_table() {
        let c = holmes();
        assert_eq!(
            fallback_reply(&c, "Hello there"),
            "Hello! I'm Sherlock Holmes. a consulting detective"
        );
        assert!(fallback_reply(&c, "HI!").starts_with("Hello! I'm"));
        assert!(fallback_reply(&c, "How are you today?").starts_with("I'm doing well"));
        assert!(fallback_reply(&c, "What do you think of London?").starts_with("That's an interesting"));
        assert!(fallback_reply(&c, "Your opinion, please").starts_with("That's an interesting"));
        assert!(fallback_reply(&c, "Explain the case").starts_with("I appreciate your question!"));
    }

    #[test]
    fn test_fallback_hi_is_whole_word() {
        let c = holmes();
        // "this" and "which" contain "hi" but are not greetings
        assert!(fallback_reply(&c, "Which of this matters?").starts_with("I appreciate"));
    }

    #[test]
    fn test_prompt_contains_persona_verbatim() {
        let responder = responder(EchoGateway::new());
        let roster = vec![holmes()];
        let transcript = Transcript::new(&[], &roster);

        let prompt = responder.build_prompt(&holmes(), "Who did it?", &transcript, None);
        assert!(prompt.starts_with("You are Sherlock Holmes, a consulting detective"));
        assert!(prompt.contains("No recent messages"));
        assert!(prompt.contains("User's message: \"Who did it?\""));
        assert!(prompt.ends_with("Respond naturally as Sherlock Holmes:"));
    }

    #[test]
    fn test_history_shared_with_names() {
        let responder = responder(EchoGateway::new());
        let roster = vec![holmes(), einstein()];
        let messages = vec![
            Message::user("Gentlemen?"),
            Message::assistant("einstein", "Time is relative."),
            Message::assistant("holmes", "So is guilt."),
            Message::director("route: holmes"),
            Message::assistant("curie", "Radium glows."),
            Message::user("").with_image("blob:1"),
        ];
        let transcript = Transcript::new(&messages, &roster);

        let prompt = responder.build_prompt(&holmes(), "Well?", &transcript, None);
        assert!(prompt.contains(
            "User: Gentlemen?\nAlbert Einstein: Time is relative.\nSherlock Holmes: So is guilt.\nDirector: route: holmes\nAnother character: Radium glows.\nUser: [shared an image]"
        ));
    }

    #[test]
    fn test_history_private_view_omits_other_characters() {
        let config = ResponderConfig {
            shared_context: false,
            ..ResponderConfig::default()
        };
        let responder = CharacterResponder::with_config(Arc::new(EchoGateway::new()), config);
        let roster = vec![holmes(), einstein()];
        let messages = vec![
            Message::assistant("einstein", "Time is relative."),
            Message::assistant("holmes", "So is guilt."),
        ];
        let transcript = Transcript::new(&messages, &roster);

        let prompt = responder.build_prompt(&holmes(), "Well?", &transcript, None);
        assert!(!prompt.contains("Time is relative."));
        assert!(prompt.contains("Sherlock Holmes: So is guilt."));
    }

    #[test]
    fn test_history_window() {
        let responder = responder(EchoGateway::new());
        let roster = vec![holmes()];
        let messages: Vec<Message> = (0..12).map(|i| Message::user(format!("line {}", i))).collect();
        let transcript = Transcript::new(&messages, &roster);

        let prompt = responder.build_prompt(&holmes(), "next", &transcript, None);
        assert!(!prompt.contains("line 1\n"));
        assert!(prompt.contains("User: line 2\n"));
        assert!(prompt.contains("User: line 11"));
    }

    #[test]
    fn test_prompt_includes_reply_context() {
        let responder = responder(EchoGateway::new());
        let roster = vec![holmes(), einstein()];
        let messages = vec![Message::assistant("einstein", "E = mc^2").with_id("m1")];
        let transcript = Transcript::new(&messages, &roster);
        let reply = ReplyContext::resolve(&transcript, "m1").unwrap();

        let prompt = responder.build_prompt(&einstein(), "Explain", &transcript, Some(&reply));
        assert!(prompt.contains("The user is replying to this message from Albert Einstein: \"E = mc^2\""));
    }

    #[tokio::test]
    async fn test_respond_uses_model_text() {
        let responder = responder(ScriptedGateway::replying("  Elementary.  "));
        let roster = vec![holmes()];
        let transcript = Transcript::new(&[], &roster);

        let reply = responder.respond(&holmes(), "Who?", &transcript, None).await;
        assert_eq!(reply.content, "Elementary.");
        assert_eq!(reply.character_id, "holmes");
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn test_respond_falls_back_on_any_failure() {
        let roster = vec![holmes()];
        let transcript = Transcript::new(&[], &roster);

        for error in [
            GatewayError::Configuration("no key".into()),
            GatewayError::Blocked("SAFETY".into()),
            GatewayError::EmptyResponse,
            GatewayError::transport("down"),
        ] {
            let responder = responder(ScriptedGateway::failing(error));
            let reply = responder.respond(&holmes(), "hello", &transcript, None).await;
            assert_eq!(reply.content, "Hello! I'm Sherlock Holmes. a consulting detective");
            assert!(reply.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_whitespace_reply_is_empty_response() {
        let responder = responder(ScriptedGateway::replying("   "));
        let roster = vec![holmes()];
        let transcript = Transcript::new(&[], &roster);

        let result = responder.try_respond(&holmes(), "Who?", &transcript, None).await;
        assert_eq!(result, Err(GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_should_respond() {
        let c = holmes();
        assert!(responder(ScriptedGateway::replying("yes")).should_respond(&c, "x").await);
        assert!(!responder(ScriptedGateway::replying(" No ")).should_respond(&c, "x").await);
        assert!(responder(ScriptedGateway::replying("maybe")).should_respond(&c, "x").await);
        assert!(
            responder(ScriptedGateway::failing(GatewayError::EmptyResponse))
                .should_respond(&c, "x")
                .await
        );
    }

    #[tokio::test]
    async fn test_introduce() {
        let c = holmes();
        let intro = responder(ScriptedGateway::replying("I observe everything."))
            .introduce(&c)
            .await;
        assert_eq!(intro, "I observe everything.");

        let intro = responder(ScriptedGateway::failing(GatewayError::transport("down")))
            .introduce(&c)
            .await;
        assert_eq!(intro, "Hello! I'm Sherlock Holmes. a consulting detective");
    }

    #[tokio::test]
    async fn test_respond_to_image() {
        let image = ImagePayload::new(vec![1, 2, 3], "image/png").unwrap();
        let gateway = Arc::new(ScriptedGateway::replying("A fine specimen."));
        let responder = CharacterResponder::new(gateway.clone());

        let reply = responder.respond_to_image(&holmes(), "Look", &image, true).await;
        assert_eq!(reply.content, "A fine specimen.");

        let call = &gateway.recorded()[0];
        assert!(call.had_image);
        assert!(call.prompt.contains("asked for everyone's opinion"));

        responder.respond_to_image(&holmes(), "Look", &image, false).await;
        assert!(gateway.recorded()[1].prompt.contains("shared an image with you"));
    }

    #[tokio::test]
    async fn test_respond_to_image_apologizes_on_failure() {
        let image = ImagePayload::new(vec![1, 2, 3], "image/png").unwrap();
        let responder = responder(ScriptedGateway::failing(GatewayError::Blocked(
            "PROHIBITED_CONTENT".into(),
        )));

        let reply = responder.respond_to_image(&holmes(), "Look", &image, false).await;
        assert_eq!(reply.content, IMAGE_APOLOGY);
        assert_eq!(reply.error.as_deref(), Some("Content policy restriction"));
    }
}
