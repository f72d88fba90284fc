use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BackendError, ChatBackend};

/// Talks to the NextStep server's chat endpoint
pub struct HttpChatBackend {
    endpoint: String,
    client: Client,
}

impl HttpChatBackend {
    /// `server_url` is the server root, e.g. `http://localhost:8000`.
    pub fn new(server_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            endpoint: format!("{}/api/v1/chat", server_url.trim_end_matches('/')),
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    response: Option<String>,
    error: Option<String>,
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, message: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|e| BackendError {
                status: e.status().map(|s| s.as_u16()),
                message: format!("chat request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| BackendError {
            status: Some(status.as_u16()),
            message: format!("failed to read chat response: {}", e),
        })?;
        let parsed = serde_json::from_str::<ChatReply>(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .unwrap_or_else(|| format!("chat endpoint returned {}: {}", status, body));
            return Err(BackendError {
                status: Some(status.as_u16()),
                message,
            });
        }

        match parsed {
            Some(ChatReply { response: Some(text), .. }) => Ok(text),
            Some(ChatReply { error: Some(err), .. }) => Err(BackendError {
                status: Some(status.as_u16()),
                message: err,
            }),
            _ => Ok(String::new()),
        }
    }
}
