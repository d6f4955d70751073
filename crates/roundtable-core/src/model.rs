//! Room data model: characters, messages, and rooms.
//!
//! Field names serialize in camelCase to match the chat wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoomError;

/// A persona taking part in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    /// Unique, stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text persona description.
    pub description: String,
    /// Optional display glyph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Character {
    /// Create a character without an avatar.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            avatar: None,
        }
    }

    /// Set the avatar glyph.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    /// Internal routing traffic; never shown to the user.
    Director,
}

/// A single chat message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    /// Message text; may be empty for image-only messages.
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Author character; present iff `role` is assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(
        default,
        rename = "imageUrl",
        alias = "imageRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<String>,
    /// Id of the message this one replies to.
    #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Copy of the replied-to content, kept for display.
    #[serde(
        default,
        rename = "replyToContent",
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_to_snapshot: Option<String>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            character_id: None,
            image_ref: None,
            reply_to_id: None,
            reply_to_snapshot: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create an assistant message authored by a character.
    pub fn assistant(character_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::with_role(MessageRole::Assistant, content);
        message.character_id = Some(character_id.into());
        message
    }

    /// Create a director message.
    pub fn director(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Director, content)
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach an image reference.
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Mark this message as a reply, snapshotting the target's content.
    pub fn replying_to(mut self, target: &Message) -> Self {
        self.reply_to_id = Some(target.id.clone());
        self.reply_to_snapshot = Some(target.content.clone());
        self
    }

    /// Whether the end user may see this message.
    pub fn is_visible(&self) -> bool {
        self.role != MessageRole::Director
    }
}

/// A conversation scoped to a roster of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    characters: Vec<Character>,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Create a room with a fresh id. Duplicate character ids keep the first.
    pub fn new(characters: impl IntoIterator<Item = Character>) -> Self {
        let now = Utc::now();
        let mut room = Self {
            id: format!("room_{}", Uuid::new_v4().simple()),
            characters: Vec::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        for character in characters {
            if room.character(&character.id).is_none() {
                room.characters.push(character);
            }
        }
        room
    }

    /// The roster, in join order.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// The full message log, director messages included.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages the end user may see.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    /// Look up a current roster member.
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Look up a message by id.
    pub fn find_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Add a character. Returns false if the id is already present.
    pub fn add_character(&mut self, character: Character) -> bool {
        if self.character(&character.id).is_some() {
            return false;
        }
        self.characters.push(character);
        self.touch();
        true
    }

    /// Remove a character. Messages it authored stay in the log.
    pub fn remove_character(&mut self, id: &str) -> Option<Character> {
        let index = self.characters.iter().position(|c| c.id == id)?;
        let removed = self.characters.remove(index);
        self.touch();
        Some(removed)
    }

    /// Append a message to the log.
    ///
    /// Assistant messages must name a current roster member; other roles
    /// must not name a character.
    pub fn append(&mut self, message: Message) -> Result<&Message, RoomError> {
        match (&message.role, &message.character_id) {
            (MessageRole::Assistant, Some(id)) => {
                if self.character(id).is_none() {
                    return Err(RoomError::UnknownCharacter(id.clone()));
                }
            }
            (MessageRole::Assistant, None) => {
                return Err(RoomError::InvalidAuthor(
                    "assistant message without a character".to_string(),
                ));
            }
            (_, Some(id)) => {
                return Err(RoomError::InvalidAuthor(format!(
                    "non-assistant message attributed to {}",
                    id
                )));
            }
            (_, None) => {}
        }

        if self.find_message(&message.id).is_some() {
            return Err(RoomError::DuplicateMessage(message.id));
        }

        self.messages.push(message);
        self.touch();
        Ok(&self.messages[self.messages.len() - 1])
    }

    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
