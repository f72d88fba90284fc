//! Server-side logic behind the chat endpoint: input validation, the internship
//! redirect, the model call and the mapping of upstream failures to HTTP statuses.

use tracing::{error, info};

use crate::llm::{ApiError, LlmProvider, LlmRequest};

pub const SYSTEM_PROMPT: &str = "You are NextStep AI, a comprehensive career guidance assistant for students. Your role is to:

1. Career Guidance: Provide general career advice, industry insights, and career path exploration (but redirect specific internship recommendations to the Internship Recommender module)
2. Interview Prep: Help with resume building, interview preparation, and professional networking strategies
3. Academic Support: Assist with college academics, course selection, study strategies, and exam preparation
4. Project Ideas: Suggest innovative project ideas across various domains (tech, research, social impact, etc.)
5. Skill Development: Guide on learning paths, certifications, technical skills, and soft skills development
6. Placement Prep: Offer tips for campus placements, aptitude tests, and company-specific preparation
7. Student Life: Provide advice on time management, stress management, work-life balance, and student well-being
8. Resources: Recommend government schemes, scholarships, online courses, and skill development platforms

IMPORTANT: If users specifically ask for \"internship recommendations\" or want you to \"suggest internships\", redirect them to use the Internship Recommender module instead.

Be supportive, practical, and actionable. Keep responses concise (2-4 sentences). Tailor advice to the Indian education system and job market when relevant.";

pub const INTERNSHIP_REDIRECT: &str = "For personalized internship recommendations based on your skills and preferences, please use our dedicated Internship Recommender module. It will provide tailored suggestions matching your profile with available opportunities. I'm here to help with general career guidance, interview prep, skill development, and other student life questions!";

const INTERNSHIP_KEYWORDS: [&str; 6] = [
    "recommend internship",
    "suggest internship",
    "find internship",
    "internship recommendation",
    "which internship",
    "what internship should",
];

/// Sampling settings for chat replies
#[derive(Debug, Clone, Copy)]
pub struct ReplySettings {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

/// Why a chat request could not be answered. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message is required and must be a string")]
    InvalidMessage,
    #[error("AI service not configured")]
    NotConfigured,
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,
    #[error("AI service requires credits. Please contact support.")]
    PaymentRequired,
    #[error("AI service error")]
    Upstream,
    #[error("No response generated")]
    EmptyReply,
    #[error("{0}")]
    Internal(String),
}

impl ChatError {
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::InvalidMessage => 400,
            ChatError::PaymentRequired => 402,
            ChatError::RateLimited => 429,
            ChatError::NotConfigured
            | ChatError::Upstream
            | ChatError::EmptyReply
            | ChatError::Internal(_) => 500,
        }
    }
}

/// True when the message asks for concrete internship picks, which are served elsewhere.
pub fn is_internship_recommendation(message: &str) -> bool {
    let lowered = message.to_lowercase();
    INTERNSHIP_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Answer one chat message.
///
/// `message` is `None` when the request body carried no usable string.
pub async fn reply(
    provider: Option<&dyn LlmProvider>,
    message: Option<&str>,
    settings: ReplySettings,
) -> Result<String, ChatError> {
    let message = match message {
        Some(m) if !m.trim().is_empty() => m,
        _ => {
            error!("chat: invalid message format");
            return Err(ChatError::InvalidMessage);
        }
    };

    let provider = provider.ok_or_else(|| {
        error!("chat: no LLM provider configured");
        ChatError::NotConfigured
    })?;

    info!(chars = message.len(), "chat: processing message");

    if is_internship_recommendation(message) {
        info!("chat: internship recommendation request, redirecting");
        return Ok(INTERNSHIP_REDIRECT.to_string());
    }

    let request = LlmRequest {
        system: Some(SYSTEM_PROMPT.to_string()),
        prompt: message.to_string(),
        max_tokens: Some(settings.max_tokens),
        temperature: Some(settings.temperature),
        timeout_seconds: None,
    };

    let response = provider.generate(request).await.map_err(|e| {
        match e.downcast_ref::<ApiError>() {
            Some(api) => {
                error!(status = api.status, body = %api.body, "chat: AI API error");
                if api.is_rate_limited() {
                    ChatError::RateLimited
                } else if api.is_payment_required() {
                    ChatError::PaymentRequired
                } else {
                    ChatError::Upstream
                }
            }
            None => {
                error!(error = %e, "chat: LLM call failed");
                ChatError::Internal(e.to_string())
            }
        }
    })?;

    if response.content.trim().is_empty() {
        error!("chat: no response from AI");
        return Err(ChatError::EmptyReply);
    }

    info!(model = %response.model, tokens = response.usage.total_tokens, "chat: AI response generated");
    Ok(response.content)
}
