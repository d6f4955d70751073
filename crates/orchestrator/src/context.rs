//! Conversation context shared by the director and the responder.

use std::time::Duration;

use roundtable_core::{Character, Gateway, GatewayError, GenerateRequest, Message, MessageRole};
use tokio::time::timeout;

/// Placeholder rendered when there is no history to show.
pub const NO_RECENT_MESSAGES: &str = "No recent messages";

/// Stand-in for history lines that only carried an image.
pub const IMAGE_ONLY_LINE: &str = "[shared an image]";

/// Label for assistant lines whose author has left the roster.
pub const FORMER_CHARACTER: &str = "Another character";

/// Longest reply snapshot quoted in a prompt, in characters.
pub const MAX_SNAPSHOT_CHARS: usize = 200;

/// A read-only view of a room's history and roster for one turn.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    messages: &'a [Message],
    roster: &'a [Character],
}

impl<'a> Transcript<'a> {
    pub fn new(messages: &'a [Message], roster: &'a [Character]) -> Self {
        Self { messages, roster }
    }

    pub fn messages(&self) -> &'a [Message] {
        self.messages
    }

    pub fn roster(&self) -> &'a [Character] {
        self.roster
    }

    pub fn find_message(&self, id: &str) -> Option<&'a Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn character(&self, id: &str) -> Option<&'a Character> {
        self.roster.iter().find(|c| c.id == id)
    }

    /// The last `window` messages.
    pub fn recent(&self, window: usize) -> &'a [Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    /// Display name for the author of an assistant message.
    pub fn author_name(&self, message: &Message) -> &'a str {
        message
            .character_id
            .as_deref()
            .and_then(|id| self.character(id))
            .map(|c| c.name.as_str())
            .unwrap_or(FORMER_CHARACTER)
    }
}

/// The message a user is replying to, as quoted to a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    pub speaker: String,
    pub snapshot: String,
}

impl ReplyContext {
    /// Resolve a reply target id against the transcript.
    ///
    /// Returns `None` when the id matches no message.
    pub fn resolve(transcript: &Transcript<'_>, reply_to: &str) -> Option<Self> {
        let target = transcript.find_message(reply_to)?;
        let speaker = match target.role {
            MessageRole::User => "User".to_string(),
            MessageRole::Assistant => transcript.author_name(target).to_string(),
            MessageRole::Director => "Director".to_string(),
        };
        Some(Self {
            speaker,
            snapshot: truncate_snapshot(&line_content(target)),
        })
    }

    /// The prompt line describing this reply.
    pub fn render(&self) -> String {
        format!(
            "The user is replying to this message from {}: \"{}\"",
            self.speaker, self.snapshot
        )
    }
}

fn truncate_snapshot(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(MAX_SNAPSHOT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Text shown for a message in a prompt.
pub(crate) fn line_content(message: &Message) -> String {
    if message.content.trim().is_empty() && message.image_ref.is_some() {
        IMAGE_ONLY_LINE.to_string()
    } else {
        message.content.clone()
    }
}

/// Join rendered lines, or the placeholder when there are none.
pub(crate) fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NO_RECENT_MESSAGES.to_string()
    } else {
        lines.join("\n")
    }
}

/// Call the gateway with a deadline and return the trimmed text.
///
/// An elapsed deadline is a transport failure; whitespace-only text is an
/// empty response.
pub(crate) async fn generate_text(
    gateway: &dyn Gateway,
    request: GenerateRequest,
    limit: Duration,
) -> Result<String, GatewayError> {
    let text = timeout(limit, gateway.generate(request))
        .await
        .map_err(|_| GatewayError::Transport(format!("gateway call timed out after {:?}", limit)))??;

    let text = text.trim();
    if text.is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Character> {
        vec![
            Character::new("holmes", "Sherlock Holmes", "a consulting detective"),
            Character::new("einstein", "Albert Einstein", "a theoretical physicist"),
        ]
    }

    #[test]
    fn test_recent_window() {
        let messages: Vec<Message> = (0..7).map(|i| Message::user(format!("m{}", i))).collect();
        let roster = roster();
        let transcript = Transcript::new(&messages, &roster);

        let recent = transcript.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(transcript.recent(50).len(), 7);
    }

    #[test]
    fn test_author_name_for_departed_character() {
        let roster = roster();
        let messages = vec![Message::assistant("curie", "Radium glows.")];
        let transcript = Transcript::new(&messages, &roster);
        assert_eq!(transcript.author_name(&messages[0]), FORMER_CHARACTER);
    }

    #[test]
    fn test_reply_context_resolves_speaker() {
        let roster = roster();
        let messages = vec![
            Message::user("Is time relative?").with_id("u1"),
            Message::assistant("einstein", "Quite so.").with_id("m1"),
        ];
        let transcript = Transcript::new(&messages, &roster);

        let reply = ReplyContext::resolve(&transcript, "m1").unwrap();
        assert_eq!(reply.speaker, "Albert Einstein");
        assert_eq!(reply.snapshot, "Quite so.");
        assert!(reply.render().contains("Albert Einstein: \"Quite so.\""));

        let reply = ReplyContext::resolve(&transcript, "u1").unwrap();
        assert_eq!(reply.speaker, "User");
        assert!(ReplyContext::resolve(&transcript, "missing").is_none());
    }

    #[test]
    fn test_reply_snapshot_truncated() {
        let roster = roster();
        let long = "é".repeat(MAX_SNAPSHOT_CHARS + 10);
        let messages = vec![Message::assistant("holmes", long).with_id("m1")];
        let transcript = Transcript::new(&messages, &roster);

        let reply = ReplyContext::resolve(&transcript, "m1").unwrap();
        assert_eq!(reply.snapshot.chars().count(), MAX_SNAPSHOT_CHARS + 3);
        assert!(reply.snapshot.ends_with("..."));
    }

    #[test]
    fn test_image_only_line() {
        let message = Message::user("").with_image("blob:1");
        assert_eq!(line_content(&message), IMAGE_ONLY_LINE);
        assert_eq!(line_content(&Message::user("hi")), "hi");
    }

    #[test]
    fn test_join_lines_placeholder() {
        assert_eq!(join_lines(Vec::new()), NO_RECENT_MESSAGES);
        assert_eq!(join_lines(vec!["a".into(), "b".into()]), "a\nb");
    }
}
