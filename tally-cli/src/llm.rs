//! Ollama adapter for the categorizer's text-generation seam.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tally_categorize::{GenerationError, TextGenerationClient};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatReply>,
    /// /api/generate style replies
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: Option<String>,
    model: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn chat_async(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_chat_response(&text)
    }

    async fn tags_async(&self) -> Result<Vec<String>, GenerationError> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_tags_response(&text)
    }
}

impl TextGenerationClient for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        if model.is_empty() {
            return Err(GenerationError::NoModel);
        }
        block_on(self.chat_async(model, prompt))?
    }

    fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        block_on(self.tags_async())?
    }
}

/// Run a future to completion from sync code.
///
/// The CLI runs under #[tokio::main], and a nested runtime would panic, so
/// reuse the current one through block_in_place when there is one.
fn block_on<F: Future>(fut: F) -> Result<F::Output, GenerationError> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
    } else {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| GenerationError::Unavailable(format!("create tokio runtime: {e}")))?;
        Ok(rt.block_on(fut))
    }
}

fn parse_chat_response(text: &str) -> Result<String, GenerationError> {
    let out: ChatResponse =
        serde_json::from_str(text).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    out.message
        .map(|m| m.content)
        .or(out.response)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GenerationError::Malformed("no message content".to_string()))
}

fn parse_tags_response(text: &str) -> Result<Vec<String>, GenerationError> {
    let out: TagsResponse =
        serde_json::from_str(text).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(out
        .models
        .into_iter()
        .filter_map(|m| m.name.or(m.model))
        .filter(|n| !n.is_empty())
        .collect())
}
