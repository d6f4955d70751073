//! Scripted gateway implementation - answers by prompt substring.

use std::sync::{Mutex, MutexGuard};

use roundtable_core::{async_trait, Gateway, GatewayError, GenerateRequest};

/// A call the scripted gateway received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub had_image: bool,
}

struct Rule {
    pattern: String,
    outcome: Result<String, GatewayError>,
}

/// A gateway that answers from a script and records every call.
///
/// Rules are checked in the order they were added; the first rule whose
/// pattern occurs in the prompt decides the outcome. Prompts that match no
/// rule get the default outcome.
pub struct ScriptedGateway {
    rules: Vec<Rule>,
    default: Result<String, GatewayError>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    /// Create a gateway whose default answer is `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_default(Ok(text.into()))
    }

    /// Create a gateway that fails every unmatched call with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default: Result<String, GatewayError>) -> Self {
        Self {
            rules: Vec::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `pattern` with `text`.
    pub fn on(mut self, pattern: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            outcome: Ok(text.into()),
        });
        self
    }

    /// Fail prompts containing `pattern` with `error`.
    pub fn fail_on(mut self, pattern: impl Into<String>, error: GatewayError) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            outcome: Err(error),
        });
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.lock().len()
    }

    /// Every call received so far, in arrival order.
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    /// Prompts received so far, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.prompt.clone()).collect()
    }

    /// Number of received prompts containing `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.lock()
            .iter()
            .filter(|c| c.prompt.contains(pattern))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        // A panicking test thread must not hide the calls from the others
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
        self.lock().push(RecordedCall {
            prompt: request.prompt().to_string(),
            had_image: request.image().is_some(),
        });

        self.rules
            .iter()
            .find(|rule| request.prompt().contains(&rule.pattern))
            .map(|rule| rule.outcome.clone())
            .unwrap_or_else(|| self.default.clone())
    }

    fn name(&self) -> &str {
        "ScriptedGateway"
    }
}
