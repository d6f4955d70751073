//! Turn orchestration: director first, then the selected characters.

use std::sync::Arc;

use futures::future::join_all;
use roundtable_core::{Character, Gateway, ImagePayload, Message};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::context::{ReplyContext, Transcript};
use crate::decision::DirectorDecision;
use crate::director::{Director, DirectorConfig};
use crate::error::OrchestratorError;
use crate::responder::{CharacterReply, CharacterResponder, ResponderConfig};

/// Message used for image turns that carry no text.
pub const IMAGE_ONLY_PROMPT: &str = "Please analyze this image";

/// One incoming user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    /// Base64 image or `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub characters: Vec<Character>,
    /// Prior history, oldest first. `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl TurnRequest {
    /// Create a text turn.
    pub fn new(
        room_id: impl Into<String>,
        user_message: impl Into<String>,
        characters: Vec<Character>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            user_message: Some(user_message.into()),
            image_data: None,
            characters,
            messages: Vec::new(),
            reply_to: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_image_data(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(image_data.into());
        self
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    fn text(&self) -> Option<&str> {
        self.user_message
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn image_data(&self) -> Option<&str> {
        self.image_data
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Check the required fields.
    ///
    /// An empty roster passes; it is reported later as
    /// [`OrchestratorError::NoCharacters`].
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.room_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "roomId is required".to_string(),
            ));
        }
        if self.text().is_none() && self.image_data().is_none() {
            return Err(OrchestratorError::InvalidRequest(
                "userMessage or imageData is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The text the characters answer, with the image placeholder applied.
    pub fn effective_message(&self) -> &str {
        self.text().unwrap_or(IMAGE_ONLY_PROMPT)
    }

    /// Decode the attached image, if any.
    pub fn image(&self) -> Result<Option<ImagePayload>, OrchestratorError> {
        self.image_data()
            .map(ImagePayload::from_base64)
            .transpose()
            .map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))
    }
}

/// One character's reply in a [`TurnReply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub content: String,
    pub character_id: String,
    pub character_name: String,
}

/// The routing metadata returned with a turn. Never shown as a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub should_multiple_respond: bool,
    pub reason: String,
}

impl From<&DirectorDecision> for DecisionSummary {
    fn from(decision: &DirectorDecision) -> Self {
        Self {
            should_multiple_respond: decision.should_broadcast,
            reason: decision.reason.clone(),
        }
    }
}

/// The answer to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    /// Replies in roster order.
    pub responses: Vec<ResponseEntry>,
    pub director_decision: DecisionSummary,
}

impl TurnReply {
    /// Assistant messages for appending to the room, in reply order.
    pub fn into_messages(self) -> Vec<Message> {
        self.responses
            .into_iter()
            .map(|entry| Message::assistant(entry.character_id, entry.content))
            .collect()
    }
}

/// Coordinates the director and the character responder for each turn.
///
/// Holds no per-room state and never mutates the request.
pub struct Orchestrator {
    director: Director,
    responder: CharacterResponder,
}

impl Orchestrator {
    /// Create an orchestrator with default settings around one gateway.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::from_parts(
            Director::new(gateway.clone()),
            CharacterResponder::new(gateway),
        )
    }

    /// Create an orchestrator whose director prompt comes from the environment.
    ///
    /// See [`crate::load_director_prompt`].
    pub fn from_env(gateway: Arc<dyn Gateway>) -> Self {
        Self::from_parts(
            Director::with_config(gateway.clone(), DirectorConfig::from_env()),
            CharacterResponder::with_config(gateway, ResponderConfig::default()),
        )
    }

    /// Assemble an orchestrator from configured parts.
    pub fn from_parts(director: Director, responder: CharacterResponder) -> Self {
        Self {
            director,
            responder,
        }
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    pub fn responder(&self) -> &CharacterResponder {
        &self.responder
    }

    /// Answer one user turn.
    ///
    /// Fails with `InvalidRequest` for a malformed turn and `NoCharacters`
    /// for an empty roster. Gateway failures become fallback content.
    pub async fn handle_turn(&self, request: &TurnRequest) -> Result<TurnReply, OrchestratorError> {
        request.validate()?;
        let image = request.image()?;
        let message = request.effective_message();
        let reply_to = request.reply_to.as_deref();
        let transcript = Transcript::new(&request.messages, &request.characters);

        info!(
            room_id = %request.room_id,
            characters = request.characters.len(),
            has_image = image.is_some(),
            "Handling turn"
        );

        let decision = self.director.decide(message, &transcript, reply_to).await?;
        debug!(reason = %decision.reason, "Director decided");

        let reply_context = reply_to.and_then(|id| ReplyContext::resolve(&transcript, id));

        let selected: &[Character] = if decision.should_broadcast {
            &decision.selected_characters
        } else {
            decision.selected_characters.get(..1).unwrap_or_default()
        };

        let replies = join_all(selected.iter().map(|character| {
            self.reply(
                character,
                message,
                &transcript,
                reply_context.as_ref(),
                image.as_ref(),
                decision.should_broadcast,
            )
        }))
        .await;

        let responses = replies
            .into_iter()
            .zip(selected)
            .map(|(reply, character)| ResponseEntry {
                content: reply.content,
                character_id: reply.character_id,
                character_name: character.name.clone(),
            })
            .collect();

        Ok(TurnReply {
            responses,
            director_decision: DecisionSummary::from(&decision),
        })
    }

    async fn reply(
        &self,
        character: &Character,
        message: &str,
        transcript: &Transcript<'_>,
        reply_context: Option<&ReplyContext>,
        image: Option<&ImagePayload>,
        broadcast: bool,
    ) -> CharacterReply {
        match image {
            Some(image) => {
                self.responder
                    .respond_to_image(character, message, image, broadcast)
                    .await
            }
            None => {
                self.responder
                    .respond(character, message, transcript, reply_context)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holmes() -> Character {
        Character::new("holmes", "Sherlock Holmes", "a consulting detective")
    }

    #[test]
    fn test_validate() {
        let ok = TurnRequest::new("room_1", "Hello", vec![holmes()]);
        assert!(ok.validate().is_ok());

        let no_room = TurnRequest::new("  ", "Hello", vec![holmes()]);
        assert!(matches!(no_room.validate(), Err(OrchestratorError::InvalidRequest(_))));

        let no_content = TurnRequest::new("room_1", "   ", vec![holmes()]);
        assert!(matches!(no_content.validate(), Err(OrchestratorError::InvalidRequest(_))));

        let empty_roster = TurnRequest::new("room_1", "Hello", Vec::new());
        assert!(empty_roster.validate().is_ok());
    }

    #[test]
    fn test_image_only_turn_uses_placeholder() {
        let request = TurnRequest::new("room_1", "", vec![holmes()])
            .with_image_data("data:image/png;base64,AAAA");
        assert!(request.validate().is_ok());
        assert_eq!(request.effective_message(), IMAGE_ONLY_PROMPT);
        assert_eq!(request.image().unwrap().unwrap().mime_type(), "image/png");
    }

    #[test]
    fn test_bad_image_is_invalid_request() {
        let request = TurnRequest::new("room_1", "Look", vec![holmes()])
            .with_image_data("data:text/plain;base64,AAAA");
        assert!(matches!(request.image(), Err(OrchestratorError::InvalidRequest(_))));
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{
            "roomId": "room_1",
            "userMessage": "Hi",
            "characters": [{"id": "holmes", "name": "Sherlock Holmes", "description": "a detective"}],
            "messages": [{"id": "m1", "role": "assistant", "content": "Hello", "characterId": "holmes"}],
            "replyTo": "m1"
        }"#;
        let request: TurnRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.reply_to.as_deref(), Some("m1"));
        assert_eq!(request.messages[0].character_id.as_deref(), Some("holmes"));
        assert!(request.image_data.is_none());

        assert!(serde_json::from_str::<TurnRequest>(r#"{"roomId": "r", "userMessage": "Hi"}"#).is_err());
    }

    #[test]
    fn test_null_messages_read_as_empty() {
        let json = r#"{"roomId": "r", "userMessage": "Hi", "characters": [], "messages": null}"#;
        let request: TurnRequest = serde_json::from_str(json).unwrap();
        assert!(request.messages.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_reply_wire_format_and_messages() {
        let reply = TurnReply {
            responses: vec![ResponseEntry {
                content: "Elementary.".into(),
                character_id: "holmes".into(),
                character_name: "Sherlock Holmes".into(),
            }],
            director_decision: DecisionSummary {
                should_multiple_respond: false,
                reason: "Detective work".into(),
            },
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["responses"][0]["characterName"], "Sherlock Holmes");
        assert_eq!(json["directorDecision"]["shouldMultipleRespond"], false);

        let messages = reply.into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].character_id.as_deref(), Some("holmes"));
        assert_eq!(messages[0].content, "Elementary.");
    }
}
