use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{AnalysisReport, ExecutionResult, SearchResults};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Observe,
    Judge,
    Act,
    Evaluate,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observe => write!(f, "observe"),
            Self::Judge => write!(f, "judge"),
            Self::Act => write!(f, "act"),
            Self::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// A phase handler failure, recorded instead of aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseError {
    pub phase: Phase,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Observations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_error: Option<String>,
}

/// The parsed `{action, parameters, reasoning}` structure produced by
/// interpreting the language model's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default)]
    pub reasoning: String,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ActionDescriptor {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            parameters: empty_object(),
            reasoning: String::new(),
        }
    }

    pub fn unknown(raw: impl Into<String>) -> Self {
        Self {
            action: "unknown".to_string(),
            parameters: empty_object(),
            reasoning: raw.into(),
        }
    }

    /// Parse a model response into a descriptor. Anything that is not a
    /// JSON action object degrades to the `unknown` action carrying the
    /// raw text as reasoning.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(strip_markdown_fences(text)).unwrap_or_else(|_| Self::unknown(text))
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(map) = self.parameters.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// A non-empty string parameter, or `None`.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchResults>,
}

impl ActionResults {
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_browser_content(content: impl Into<String>) -> Self {
        Self {
            browser_content: Some(content.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub success: bool,
    pub feedback: String,
}

/// The record threaded through every phase of a task run. Passed by value
/// into each handler; a handler that fails leaves the pre-call state
/// intact for that handler only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskContext {
    pub task: String,
    pub iterations: usize,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,
    pub take_screenshot: bool,
    pub observations: Observations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_action: Option<ActionDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_results: Option<ActionResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phase_errors: Vec<PhaseError>,
}

/// Strip markdown code fences from an LLM response to extract raw content.
/// Handles ```json, ```, and plain text (no fences).
pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action_object() {
        let text = r#"{"action": "browse", "parameters": {"url": "https://example.com"}, "reasoning": "start here"}"#;
        let action = ActionDescriptor::parse(text);
        assert_eq!(action.action, "browse");
        assert_eq!(action.str_param("url"), Some("https://example.com"));
        assert_eq!(action.reasoning, "start here");
    }

    #[test]
    fn parse_fenced_action_object() {
        let text = "```json\n{\"action\": \"complete\", \"parameters\": {}, \"reasoning\": \"done\"}\n```";
        let action = ActionDescriptor::parse(text);
        assert_eq!(action.action, "complete");
    }

    #[test]
    fn parse_failure_degrades_to_unknown() {
        let text = "I think we should look at the documentation first.";
        let action = ActionDescriptor::parse(text);
        assert_eq!(action.action, "unknown");
        assert_eq!(action.parameters, serde_json::json!({}));
        assert_eq!(action.reasoning, text);
    }

    #[test]
    fn parse_json_without_action_degrades_to_unknown() {
        let text = r#"{"parameters": {"url": "https://example.com"}}"#;
        let action = ActionDescriptor::parse(text);
        assert_eq!(action.action, "unknown");
        assert_eq!(action.reasoning, text);
    }

    #[test]
    fn str_param_ignores_empty_strings() {
        let action = ActionDescriptor::new("browse").with_param("url", "");
        assert_eq!(action.str_param("url"), None);
    }

    #[test]
    fn strip_fences_json() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_markdown_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn strip_fences_plain() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_markdown_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn strip_fences_none() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_markdown_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn strip_fences_no_closing() {
        let input = "```json\n{\"key\": \"value\"}";
        assert_eq!(strip_markdown_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn context_deserializes_from_partial_json() {
        let ctx: TaskContext =
            serde_json::from_str(r#"{"browser_url": "https://example.com"}"#).unwrap();
        assert_eq!(ctx.browser_url.as_deref(), Some("https://example.com"));
        assert_eq!(ctx.iterations, 0);
        assert!(!ctx.complete);
    }
}
