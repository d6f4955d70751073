//! Character selection for each turn.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use roundtable_core::{fill_template, hash_prompt, Character, Gateway, GenerateRequest, MessageRole};
use tracing::{debug, info, trace, warn};

use crate::context::{generate_text, join_lines, line_content, Transcript};
use crate::decision::{parse_decision, DirectorDecision};
use crate::error::OrchestratorError;
use crate::responder::DEFAULT_CALL_TIMEOUT;

/// Default path for the director prompt file.
pub const DEFAULT_DIRECTOR_PROMPT_FILE: &str = "DIRECTOR_PROMPT.md";

/// Default number of history messages shown to the director.
pub const DEFAULT_DIRECTOR_WINDOW: usize = 5;

/// Default director prompt (used when no override is found).
///
/// Placeholders: `{CHARACTERS}`, `{CONVERSATION_CONTEXT}`, `{USER_MESSAGE}`
/// and `{REPLY_CONTEXT}`.
pub const DEFAULT_DIRECTOR_PROMPT: &str = r#"You are the director of a group chat with several AI characters. Decide which character or characters should answer the user's latest message.

Available characters:
{CHARACTERS}

Recent conversation (last 5 messages):
{CONVERSATION_CONTEXT}

User's message: "{USER_MESSAGE}"
{REPLY_CONTEXT}
Instructions:
1. Read the user's message and the recent conversation
2. Weigh each character's expertise, personality, and relevance to the topic
3. Decide whether one character or several should answer
4. Keep the chat family-friendly and educational
5. Answer with ONLY a JSON object in exactly this format:
{
  "shouldMultipleRespond": true/false,
  "selectedCharacterIds": ["id1", "id2"],
  "reason": "Brief explanation of your decision"
}

Rules:
- A general question, or one addressed to the whole group ("what do you all think"), gets several characters
- A question within one character's expertise gets only that character
- A reply to a specific character's message gets that character
- Keep the reason short

Respond with ONLY the JSON object:"#;

/// Phrases that address the whole room.
const GROUP_PHRASES: [&str; 6] = [
    "everyone",
    "everybody",
    "you all",
    "all of you",
    "what do you all think",
    "y'all",
];

/// Words that address the whole room when they stand alone.
const GROUP_WORDS: [&str; 1] = ["all"];

/// A group word right after one of these is an idiom ("not at all",
/// "is that all"), not an address.
const IDIOM_LEADS: [&str; 2] = ["at", "that"];

/// Load the director prompt template.
///
/// Priority:
/// 1. `DIRECTOR_PROMPT` env var (if set)
/// 2. Contents of prompt file (`DIRECTOR_PROMPT_FILE` or default `DIRECTOR_PROMPT.md`)
/// 3. Embedded default prompt
pub fn load_director_prompt() -> String {
    if let Ok(prompt) = env::var("DIRECTOR_PROMPT") {
        if !prompt.trim().is_empty() {
            info!("Using director prompt from DIRECTOR_PROMPT env var");
            return prompt;
        }
    }

    let prompt_file = env::var("DIRECTOR_PROMPT_FILE")
        .unwrap_or_else(|_| DEFAULT_DIRECTOR_PROMPT_FILE.to_string());

    if let Some(prompt) = load_prompt_file(&prompt_file) {
        info!("Loaded director prompt from {}", prompt_file);
        return prompt;
    }

    info!("Using embedded default director prompt");
    DEFAULT_DIRECTOR_PROMPT.to_string()
}

/// Returns `Some(content)` if the file exists and is not blank.
fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Settings for [`Director`].
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// How many trailing history messages go into the prompt.
    pub history_window: usize,
    /// Deadline for the director model call.
    pub call_timeout: Duration,
    /// Prompt template.
    pub prompt: String,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_DIRECTOR_WINDOW,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            prompt: DEFAULT_DIRECTOR_PROMPT.to_string(),
        }
    }
}

impl DirectorConfig {
    /// Default settings with the prompt from [`load_director_prompt`].
    pub fn from_env() -> Self {
        Self {
            prompt: load_director_prompt(),
            ..Self::default()
        }
    }
}

/// Decides which characters answer a turn.
///
/// The director is stateless. A reply to a character's message pins the
/// decision to that character without a model call. Otherwise the model is
/// asked for a JSON decision, and unusable output or a failed call falls
/// back to the keyword heuristic in [`fallback_decision`].
pub struct Director {
    gateway: Arc<dyn Gateway>,
    config: DirectorConfig,
    prompt_hash: String,
}

impl Director {
    /// Create a director with the default prompt.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, DirectorConfig::default())
    }

    /// Create a director with the given settings.
    pub fn with_config(gateway: Arc<dyn Gateway>, config: DirectorConfig) -> Self {
        let prompt_hash = hash_prompt(&config.prompt);
        info!("Director prompt fingerprint: {}", prompt_hash);
        if !config.prompt.contains("{USER_MESSAGE}") {
            warn!("Director prompt has no {{USER_MESSAGE}} placeholder");
        }
        Self {
            gateway,
            config,
            prompt_hash,
        }
    }

    /// Get the director prompt fingerprint.
    pub fn prompt_hash(&self) -> &str {
        &self.prompt_hash
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Decide who answers `user_message`.
    ///
    /// Fails only for an empty roster; every other failure becomes a
    /// fallback decision.
    pub async fn decide(
        &self,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply_to: Option<&str>,
    ) -> Result<DirectorDecision, OrchestratorError> {
        match self.try_decide(user_message, transcript, reply_to).await {
            Ok(decision) => Ok(decision),
            Err(OrchestratorError::NoCharacters) => Err(OrchestratorError::NoCharacters),
            Err(e) => {
                let cause = match &e {
                    OrchestratorError::Gateway(g) => {
                        warn!(error = %g, "DIRECTOR_GATEWAY_ERROR");
                        g.kind().label().to_string()
                    }
                    other => {
                        warn!(error = %other, "DIRECTOR_PARSE_FAILED");
                        "unusable director output".to_string()
                    }
                };
                fallback_decision(transcript.roster(), user_message, &cause)
            }
        }
    }

    /// Primary stage: reply-pin, then the model.
    ///
    /// Returns the gateway or parse failure instead of falling back.
    pub async fn try_decide(
        &self,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply_to: Option<&str>,
    ) -> Result<DirectorDecision, OrchestratorError> {
        let roster = transcript.roster();
        if roster.is_empty() {
            return Err(OrchestratorError::NoCharacters);
        }

        if let Some(character) = reply_to.and_then(|id| replied_character(transcript, id)) {
            debug!(character_id = %character.id, "Reply pins the decision");
            return Ok(DirectorDecision {
                should_broadcast: false,
                selected_characters: vec![character.clone()],
                reason: format!(
                    "User is replying to {}'s message, so {} should respond.",
                    character.name, character.name
                ),
            });
        }

        let prompt = self.build_prompt(user_message, transcript, reply_to);
        trace!(prompt = %prompt, "DIRECTOR_INPUT");

        let raw = generate_text(
            self.gateway.as_ref(),
            GenerateRequest::new(prompt)?,
            self.config.call_timeout,
        )
        .await?;
        trace!(raw_response = %raw, "DIRECTOR_RAW_RESPONSE");

        let parsed = parse_decision(&raw, roster).map_err(|e| {
            debug!(raw_response = %raw, "Director output rejected");
            e
        })?;
        let decision = parsed.into_decision(roster);

        info!(
            broadcast = decision.should_broadcast,
            selected = ?decision.selected_ids(),
            "Director decision"
        );
        Ok(decision)
    }

    /// Build the director prompt for a turn.
    pub fn build_prompt(
        &self,
        user_message: &str,
        transcript: &Transcript<'_>,
        reply_to: Option<&str>,
    ) -> String {
        let characters = transcript
            .roster()
            .iter()
            .map(|c| format!("- {} (ID: {}): {}", c.name, c.id, c.description))
            .collect::<Vec<_>>()
            .join("\n");

        let lines = transcript
            .recent(self.config.history_window)
            .iter()
            .filter_map(|message| {
                let speaker = match message.role {
                    MessageRole::User => "User",
                    MessageRole::Assistant => transcript.author_name(message),
                    MessageRole::Director => return None,
                };
                Some(format!("{}: {}", speaker, line_content(message)))
            })
            .collect();
        let context = join_lines(lines);

        let reply_note = reply_to
            .and_then(|id| transcript.find_message(id))
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| {
                let name = transcript.author_name(m);
                format!(
                    "\nIMPORTANT: The user is replying to a message from {}. {} should respond to keep the conversation continuous.\n",
                    name, name
                )
            })
            .unwrap_or_default();

        fill_template(
            &self.config.prompt,
            &[
                ("CHARACTERS", &characters),
                ("CONVERSATION_CONTEXT", &context),
                ("USER_MESSAGE", user_message),
                ("REPLY_CONTEXT", &reply_note),
            ],
        )
    }
}

/// The roster character who wrote the replied-to message, if any.
fn replied_character<'a>(transcript: &Transcript<'a>, reply_to: &str) -> Option<&'a Character> {
    let target = transcript.find_message(reply_to)?;
    if target.role != MessageRole::Assistant {
        return None;
    }
    transcript.character(target.character_id.as_deref()?)
}

/// Whether the message addresses the whole room.
pub fn is_group_message(user_message: &str) -> bool {
    let lower = user_message.to_lowercase();
    if GROUP_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return true;
    }
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();
    tokens.iter().enumerate().any(|(i, token)| {
        GROUP_WORDS.contains(token) && !(i > 0 && IDIOM_LEADS.contains(&tokens[i - 1]))
    })
}

/// Fallback stage: keyword heuristic that never calls the model.
///
/// A group message selects the whole roster as a broadcast. Anything else
/// selects the first roster character alone. `cause` is recorded in the
/// reason after the `Fallback:` prefix.
pub fn fallback_decision(
    roster: &[Character],
    user_message: &str,
    cause: &str,
) -> Result<DirectorDecision, OrchestratorError> {
    let first = roster.first().ok_or(OrchestratorError::NoCharacters)?;

    if is_group_message(user_message) {
        return Ok(DirectorDecision {
            should_broadcast: true,
            selected_characters: roster.to_vec(),
            reason: format!("Fallback: {}; group question, everyone responds", cause),
        });
    }

    Ok(DirectorDecision {
        should_broadcast: false,
        selected_characters: vec![first.clone()],
        reason: format!("Fallback: {}; using first available character", cause),
    })
}
