//! Ollama chat API client.
//!
//! HTTP/1.1 streaming via reqwest against `POST /api/chat`; responses
//! arrive as newline-delimited JSON chunks. JSON mode (`format: "json"`)
//! backs structured extraction.

use crate::errors::{AdvisorError, Result};
use crate::llm::{ChatMessage, ChatRole, LanguageModel, TokenStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request timeout. Turn-level code imposes no timeout of its own; this is
/// the only bound on a model call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama streaming chat client
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AdvisorError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            stream: false,
            format: json_mode.then(|| "json".to_string()),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::ModelError(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::ModelError(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::ModelError(format!("bad response body: {}", e)))?;

        Ok(chat.message.content)
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        self.complete(messages, false).await
    }

    async fn invoke_json(&self, messages: &[ChatMessage]) -> Result<String> {
        self.complete(messages, true).await
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            stream: true,
            format: None,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::ModelError(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::ModelError(format!("HTTP {}: {}", status, body)));
        }

        // Each network chunk may carry several newline-delimited JSON
        // objects, or a partial one; buffer on line boundaries.
        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| AdvisorError::StreamingError(e.to_string())))
            .scan(String::new(), |carry, result| {
                let deltas = match result {
                    Ok(bytes) => {
                        carry.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out: Vec<Result<String>> = Vec::new();
                        while let Some(pos) = carry.find('\n') {
                            let line: String = carry.drain(..=pos).collect();
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<ChatResponse>(line) {
                                Ok(chunk) if !chunk.message.content.is_empty() => {
                                    out.push(Ok(chunk.message.content));
                                }
                                Ok(_) => {}
                                Err(e) => out.push(Err(AdvisorError::StreamingError(format!(
                                    "bad stream chunk: {}",
                                    e
                                )))),
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(e)],
                };
                futures_util::future::ready(Some(futures_util::stream::iter(deltas)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: match m.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            }
            .to_string(),
            content: m.content.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}
