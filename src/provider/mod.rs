//! Remote translation backends.

mod gemini;
mod openai;

pub use gemini::{GeminiClient, FALLBACK_MODELS};
pub use openai::{OpenAiClient, OPENAI_MODEL};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::config::Provider;
use crate::error::TranslationError;

pub(crate) static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub provider: Provider,
    pub api_key: String,
}

/// Outcome of a live "does this key work" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCheck {
    pub success: bool,
    pub message: String,
}

impl KeyCheck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, req: &TranslationRequest) -> Result<String, TranslationError>;

    async fn test_key(&self, api_key: &str) -> KeyCheck;
}

pub(crate) fn is_blank(key: &str) -> bool {
    key.trim().is_empty()
}

/// Response body for error reporting; the body read itself may fail.
pub(crate) async fn body_text(resp: reqwest::Response) -> String {
    resp.text().await.unwrap_or_default().trim().to_string()
}
