pub mod groq;
pub mod lead;
pub mod ollama;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion backend. Implementations ask the model for a JSON object
/// reply.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// System prompt first, then the conversation, in the role/content shape
/// both backends accept.
fn chat_messages(system_prompt: &str, messages: &[Message]) -> Vec<serde_json::Value> {
    std::iter::once(json!({ "role": "system", "content": system_prompt }))
        .chain(
            messages
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content })),
        )
        .collect()
}

/// Sends `request` and decodes the JSON body. Non-success statuses become
/// errors carrying the body.
async fn send_json(
    request: reqwest::RequestBuilder,
    backend: &str,
) -> anyhow::Result<serde_json::Value> {
    let resp = request
        .send()
        .await
        .with_context(|| format!("failed to call {backend} API"))?;

    let status = resp.status();
    let data: serde_json::Value = resp
        .json()
        .await
        .with_context(|| format!("failed to parse {backend} response"))?;

    if !status.is_success() {
        anyhow::bail!("{backend} API error ({status}): {data}");
    }
    Ok(data)
}

/// Pulls the reply text at `pointer` out of a decoded response.
fn reply_text(data: &serde_json::Value, pointer: &str, backend: &str) -> anyhow::Result<String> {
    data.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing content in {backend} response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_messages_put_system_prompt_first() {
        let msgs = chat_messages("Svara med JSON.", &[Message::user("Kund: Anna")]);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[0]["content"], "Svara med JSON.");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[1]["content"], "Kund: Anna");
    }

    #[test]
    fn test_reply_text_follows_pointer() {
        let groq = json!({ "choices": [{ "message": { "content": "{}" } }] });
        assert_eq!(reply_text(&groq, "/choices/0/message/content", "Groq").unwrap(), "{}");

        let ollama = json!({ "message": { "role": "assistant" } });
        let err = reply_text(&ollama, "/message/content", "Ollama").unwrap_err();
        assert!(err.to_string().contains("Ollama"));
    }
}
