use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::LlmConfig;

/// Some hosted models append promotional text after this marker
const AD_SEPARATOR: &str = "####";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Conversational fallback for messages that match no command.
///
/// History is kept per conversation scope, in memory only.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build chat HTTP client")?;
        Ok(Self {
            client,
            config,
            conversations: Mutex::new(HashMap::new()),
        })
    }

    /// Answer `text` within the conversation `scope`
    pub async fn answer(&self, text: &str, scope: &str) -> Result<String> {
        let mut messages = vec![ChatMessage::new("system", &self.config.system_prompt)];
        {
            let conversations = self.conversations.lock().await;
            if let Some(history) = conversations.get(scope) {
                messages.extend(history.iter().cloned());
            }
        }
        messages.push(ChatMessage::new("user", text));

        let reply = self.chat(messages).await?;
        let reply = strip_advert(&reply).to_string();
        if reply.is_empty() {
            anyhow::bail!("Empty answer from {}", self.config.provider);
        }

        let mut conversations = self.conversations.lock().await;
        let history = conversations.entry(scope.to_string()).or_default();
        history.push(ChatMessage::new("user", text));
        history.push(ChatMessage::new("assistant", &reply));
        let overflow = history.len().saturating_sub(self.config.max_history);
        history.drain(..overflow);

        Ok(reply)
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.effective_base_url().trim_end_matches('/')
        );

        debug!("Sending request to {}: {}", self.config.provider, url);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.config.provider))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} API error ({}): {}",
                self.config.provider,
                status,
                error_body
            );
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.config.provider))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .with_context(|| format!("No response from {}", self.config.provider))
    }

    #[cfg(test)]
    async fn history_len(&self, scope: &str) -> usize {
        self.conversations
            .lock()
            .await
            .get(scope)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn strip_advert(reply: &str) -> &str {
    reply.split(AD_SEPARATOR).next().unwrap_or("").trim()
}
