use async_trait::async_trait;
use serde_json::json;

use super::{chat_messages, reply_text, send_json, LlmProvider, Message};

/// Local Ollama server. `format: json` constrains the reply to one object.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, messages),
            "stream": false,
            "format": "json",
        });

        let data = send_json(self.client.post(self.chat_url()).json(&body), "Ollama").await?;

        reply_text(&data, "/message/content", "Ollama")
    }
}
