use serde::{Deserialize, Serialize};

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LLMConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            max_tokens: Some(800),
            temperature: Some(0.2),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LLMConfig {
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn chat_completions_url(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}chat/completions", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_research_tab() {
        let config = LLMConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, Some(800));
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn test_chat_completions_url_handles_trailing_slash() {
        let mut config = LLMConfig::default();
        config.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(
            config.chat_completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        config.base_url = "http://localhost:8080/v1".to_string();
        assert_eq!(
            config.chat_completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let config = LLMConfig::default().with_api_key(Some("  ".to_string()));
        assert!(config.api_key.is_none());
    }
}
