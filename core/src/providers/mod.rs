pub mod anthropic;

pub use anthropic::{ChatMessage, LlmClient, NO_API_KEY_ERROR, next_action_prompts};
