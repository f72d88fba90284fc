use serde::{Deserialize, Serialize};

pub mod client;
pub mod session;
pub mod store;

pub use client::HttpChatBackend;
pub use session::{ChatSession, SendOutcome};
pub use store::{ChatStore, FileStorage, MemoryStorage, Storage};

pub const GREETING: &str = "Hi! I'm NextStep AI, your career guidance companion. Ask me about internships, career paths, skill development, academics, or student life!";

pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error. Please try again or rephrase your question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn greeting() -> Self {
        Self::assistant(GREETING)
    }
}

/// Failed chat call as seen by the client
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// HTTP status when the server answered at all
    pub status: Option<u16>,
    pub message: String,
}

/// Transport for outbound chat messages.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one message and wait for the single reply.
    async fn send(&self, message: &str) -> Result<String, BackendError>;
}

/// User-facing notification raised by the chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    RateLimited,
    PaymentRequired,
    RequestFailed,
    HistoryCleared,
}

impl Notice {
    /// Pick the notice for a failed call from its status and message.
    pub fn for_error(err: &BackendError) -> Self {
        let message = err.message.to_lowercase();
        if err.status == Some(429) || message.contains("429") || message.contains("rate limit") {
            Notice::RateLimited
        } else if err.status == Some(402) || message.contains("402") || message.contains("payment") {
            Notice::PaymentRequired
        } else {
            Notice::RequestFailed
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notice::RateLimited => "Rate limit exceeded",
            Notice::PaymentRequired => "AI service unavailable",
            Notice::RequestFailed => "Error",
            Notice::HistoryCleared => "Chat cleared",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Notice::RateLimited => "Please wait a moment before sending another message.",
            Notice::PaymentRequired => "Please contact support to add credits to your workspace.",
            Notice::RequestFailed => "Failed to get response. Please try again.",
            Notice::HistoryCleared => "Your conversation history has been cleared.",
        }
    }

    /// Whether the notice reports a failure
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::HistoryCleared)
    }
}
