//! Director decisions and parsing of the director model's output.

use roundtable_core::Character;
use serde_json::{Map, Value};
use thiserror::Error;

/// Which character(s) answer a turn.
///
/// `selected_characters` is never empty, is a subset of the roster, and
/// keeps roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorDecision {
    pub should_broadcast: bool,
    pub selected_characters: Vec<Character>,
    pub reason: String,
}

impl DirectorDecision {
    /// Ids of the selected characters, in order.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.selected_characters.iter().map(|c| c.id.as_str()).collect()
    }

    /// Whether this decision came from the heuristic fallback.
    pub fn is_fallback(&self) -> bool {
        self.reason.starts_with("Fallback:")
    }
}

/// A well-formed decision read from the director model.
///
/// Every id is known to the roster it was parsed against and the selection
/// is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    pub should_multiple_respond: bool,
    pub selected_character_ids: Vec<String>,
    pub reason: String,
}

impl ParsedDecision {
    /// Resolve the ids against the roster.
    ///
    /// Selection follows roster order with duplicates collapsed. A
    /// single-responder decision naming several characters keeps the first.
    pub fn into_decision(self, roster: &[Character]) -> DirectorDecision {
        let mut selected: Vec<Character> = roster
            .iter()
            .filter(|c| self.selected_character_ids.iter().any(|id| *id == c.id))
            .cloned()
            .collect();

        if !self.should_multiple_respond {
            selected.truncate(1);
        }

        DirectorDecision {
            should_broadcast: self.should_multiple_respond,
            selected_characters: selected,
            reason: self.reason,
        }
    }
}

/// Why the director model's output could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedDecision {
    #[error("no JSON object in director output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Syntax(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("wrong type for field: {0}")]
    WrongType(&'static str),

    #[error("no characters selected")]
    EmptySelection,

    #[error("unknown character id: {0}")]
    UnknownCharacter(String),
}

const SHOULD_MULTIPLE_RESPOND: &str = "shouldMultipleRespond";
const SELECTED_CHARACTER_IDS: &str = "selectedCharacterIds";
const REASON: &str = "reason";

/// Parse and validate the director model's raw output.
///
/// Markdown fences are stripped and the first balanced `{...}` span is
/// read. All three fields are required and every selected id must belong
/// to `roster`.
pub fn parse_decision(raw: &str, roster: &[Character]) -> Result<ParsedDecision, MalformedDecision> {
    let json = extract_json(raw).ok_or(MalformedDecision::NoJson)?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| MalformedDecision::Syntax(e.to_string()))?;
    let object = value.as_object().ok_or(MalformedDecision::NoJson)?;

    let should_multiple_respond = field(object, SHOULD_MULTIPLE_RESPOND)?
        .as_bool()
        .ok_or(MalformedDecision::WrongType(SHOULD_MULTIPLE_RESPOND))?;

    let ids = field(object, SELECTED_CHARACTER_IDS)?
        .as_array()
        .ok_or(MalformedDecision::WrongType(SELECTED_CHARACTER_IDS))?;

    let reason = field(object, REASON)?
        .as_str()
        .ok_or(MalformedDecision::WrongType(REASON))?
        .trim();

    let mut selected_character_ids = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id
            .as_str()
            .ok_or(MalformedDecision::WrongType(SELECTED_CHARACTER_IDS))?;
        if !roster.iter().any(|c| c.id == id) {
            return Err(MalformedDecision::UnknownCharacter(id.to_string()));
        }
        selected_character_ids.push(id.to_string());
    }

    if selected_character_ids.is_empty() {
        return Err(MalformedDecision::EmptySelection);
    }

    Ok(ParsedDecision {
        should_multiple_respond,
        selected_character_ids,
        reason: if reason.is_empty() {
            "No reason provided".to_string()
        } else {
            reason.to_string()
        },
    })
}

fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, MalformedDecision> {
    match object.get(name) {
        None | Some(Value::Null) => Err(MalformedDecision::MissingField(name)),
        Some(value) => Ok(value),
    }
}

/// Strip code fences and return the first JSON object in the text.
fn extract_json(response: &str) -> Option<String> {
    let cleaned = response.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    Some(extract_balanced_json(&cleaned[start..]).to_string())
}

/// Extract a balanced JSON object from a string that starts with '{'.
///
/// Trailing text and extra closing braces are dropped. Unbalanced input is
/// returned unchanged.
fn extract_balanced_json(s: &str) -> &str {
    if !s.starts_with('{') {
        return s;
    }

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return &s[..=i];
                }
            }
            _ => {}
        }
    }

    s
}
