use thiserror::Error;

use crate::config::Provider;

/// Failures of a single translation attempt.
///
/// Every variant renders to a message suitable for an on-page notice; the
/// orchestrator never lets one escape past the notice.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("{provider} API key is invalid")]
    InvalidKey { provider: Provider },

    #[error("no Gemini model supports generateContent")]
    NoAvailableModel,

    #[error("{provider} API error{}: {status} {body}", model_suffix(.model))]
    ProviderError {
        provider: Provider,
        model: Option<String>,
        status: u16,
        body: String,
    },

    #[error("could not translate with {provider}{}: {body}", model_suffix(.model))]
    MalformedResponse {
        provider: Provider,
        model: Option<String>,
        body: String,
    },

    #[error("all Gemini models are unavailable")]
    AllModelsExhausted,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TranslationError {
    /// HTTP status carried by a provider failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TranslationError::ProviderError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Candidate model the failure is tagged with, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            TranslationError::ProviderError { model, .. }
            | TranslationError::MalformedResponse { model, .. } => model.as_deref(),
            _ => None,
        }
    }
}

fn model_suffix(model: &Option<String>) -> String {
    model
        .as_deref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default()
}

/// Settings persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures locating or delivering to a page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("could not query the active tab: {0}")]
    Query(String),

    #[error("tab {0} is not receiving messages")]
    Closed(u64),
}
