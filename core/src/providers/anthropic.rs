use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::agent::TaskContext;
use crate::config::{AgentConfig, LlmConfig};

pub const NO_API_KEY_ERROR: &str =
    "Error: LLM client not available. Please provide a valid API key.";

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        if config.api_key.is_empty() {
            warn!("No API key provided. LLM functionality will be limited.");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: "https://api.anthropic.com".to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Generate a response for the given messages. Always returns text:
    /// a missing key or a provider failure produces an error string, so
    /// callers never have to branch on a transport error.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> String {
        if self.api_key.is_empty() {
            error!("Cannot generate response: no API key configured");
            return NO_API_KEY_ERROR.to_string();
        }

        match self
            .request(messages, system_prompt, temperature, max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Error generating response: {e}");
                format!("Error generating response: {e}")
            }
        }
    }

    async fn request(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> anyhow::Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            system: system_prompt.unwrap_or(""),
            messages,
            temperature: temperature.unwrap_or(self.temperature),
            max_tokens: max_tokens.unwrap_or(self.max_tokens),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("API error {}: {}", status, error_text));
        }

        let parsed: MessagesResponse = response.json().await?;

        parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| anyhow::anyhow!("No text content in response"))
    }
}

/// Build the system and user prompts asking the model for the next action.
pub fn next_action_prompts(agent: &AgentConfig, ctx: &TaskContext) -> (String, String) {
    let system_prompt = format!(
        "You are {}, {}.\n\
         Your task is to determine the next action to take based on the current context.\n\
         Respond with a JSON object of the following structure:\n\
         {{\n\
             \"action\": \"action_name\",\n\
             \"parameters\": {{\"param1\": \"value1\"}},\n\
             \"reasoning\": \"Your reasoning for choosing this action\"\n\
         }}\n\
         Valid actions: browse, click, type, execute_code, search_code, analyze_code, complete.",
        agent.name, agent.description
    );

    let observations =
        serde_json::to_string_pretty(&ctx.observations).unwrap_or_else(|_| "{}".to_string());
    let user_message = format!(
        "Current task: {}\n\nObservations:\n{}\n\n\
         Based on the current context, what is the next action I should take?",
        ctx.task, observations
    );

    (system_prompt, user_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_without_api_key_returns_fixed_error() {
        let config = LlmConfig {
            api_key: String::new(),
            ..Default::default()
        };
        let client = LlmClient::new(&config);
        assert!(!client.has_api_key());

        let response = client
            .generate(&[ChatMessage::user("hello")], None, None, None)
            .await;
        assert_eq!(response, NO_API_KEY_ERROR);
    }

    #[tokio::test]
    async fn generate_converts_provider_errors_to_text() {
        // Unroutable base URL: the request fails fast and the failure is
        // folded into the returned string.
        let config = LlmConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        };
        let client = LlmClient::new(&config).with_base_url("http://127.0.0.1:1");

        let response = client
            .generate(&[ChatMessage::user("hello")], None, None, None)
            .await;
        assert!(response.starts_with("Error generating response:"));
    }

    #[test]
    fn next_action_prompts_include_task_and_observations() {
        let agent = AgentConfig::default();
        let ctx = TaskContext {
            task: "find the docs".to_string(),
            ..Default::default()
        };

        let (system_prompt, user_message) = next_action_prompts(&agent, &ctx);
        assert!(system_prompt.contains(&agent.name));
        assert!(system_prompt.contains("\"action\""));
        assert!(user_message.contains("find the docs"));
    }

    #[test]
    fn response_content_takes_first_text_block() {
        let raw = r#"{"content": [{"type": "tool_use", "id": "x", "name": "n", "input": {}}, {"type": "text", "text": "hello"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text = parsed.content.into_iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        });
        assert_eq!(text.as_deref(), Some("hello"));
    }
}
