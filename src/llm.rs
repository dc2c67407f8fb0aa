//! Completion provider speaking the OpenAI-compatible chat API.
//!
//! Config carries an ordered list of endpoints so different tasks can later
//! be routed to different models; the first entry serves every call today.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::models::Message;
use crate::traits::CompletionProvider;

pub struct OpenAiCompletions {
    url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompletions {
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let endpoint = api
            .endpoints
            .first()
            .context("no completion endpoint configured")?;
        Ok(Self {
            url: endpoint.url.trim_end_matches('/').to_string(),
            model: endpoint.model.clone(),
            api_key: endpoint.api_key.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl CompletionProvider for OpenAiCompletions {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("sending chat completion request")?
            .error_for_status()
            .context("chat completion request rejected")?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("decoding chat completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completion response contained no choices"))
    }
}
