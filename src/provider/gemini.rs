use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{body_text, is_blank, KeyCheck, TranslationRequest, Translator, CLIENT};
use crate::config::Provider;
use crate::error::TranslationError;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Used when model discovery fails. Most capable first.
pub const FALLBACK_MODELS: &[&str] = &[
    "gemini-1.5-pro",
    "gemini-1.0-pro",
    "gemini-pro",
    "gemini-pro-vision",
];

const GENERATE_METHOD: &str = "generateContent";

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

/// One generate call's outcome, before the fallback policy is applied.
enum Attempt {
    Translated(String),
    NotFound,
    Failed(TranslationError),
}

/// Gemini client with model discovery and ordered fallback.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: CLIENT.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replaces the shared HTTP client, e.g. for a different timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn models_url(&self) -> String {
        format!("{}/v1beta/models", self.base_url)
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, GENERATE_METHOD)
    }

    /// Lists models that can generate content, without the `models/` prefix.
    /// `Err` carries the status and body of a failed listing.
    async fn discover(&self, api_key: &str) -> Result<Vec<String>, TranslationError> {
        let resp = self
            .client
            .get(self.models_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslationError::ProviderError {
                provider: Provider::Gemini,
                model: None,
                status: status.as_u16(),
                body: body_text(resp).await,
            });
        }

        let list: ModelList = resp.json().await?;
        Ok(list
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_METHOD))
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    /// Discovery with the fixed list as a fallback.
    async fn candidates(&self, api_key: &str) -> Vec<String> {
        match self.discover(api_key).await {
            Ok(models) => {
                tracing::debug!(?models, "gemini models supporting generateContent");
                models
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch gemini model list, using fallback models");
                FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
            }
        }
    }

    async fn generate(&self, model: &str, api_key: &str, body: &GenerateRequest<'_>) -> Attempt {
        let resp = match self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Failed(e.into()),
        };

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Attempt::NotFound;
        }
        if !status.is_success() {
            return Attempt::Failed(TranslationError::ProviderError {
                provider: Provider::Gemini,
                model: Some(model.to_string()),
                status: status.as_u16(),
                body: body_text(resp).await,
            });
        }

        let text = body_text(resp).await;
        match extract_text(&text) {
            Some(t) => Attempt::Translated(t),
            None => Attempt::Failed(TranslationError::MalformedResponse {
                provider: Provider::Gemini,
                model: Some(model.to_string()),
                body: text,
            }),
        }
    }

    /// Tries each candidate in order. A failure other than "not found" is
    /// returned only when it came from the last candidate.
    async fn translate_with(
        &self,
        models: &[String],
        api_key: &str,
        body: &GenerateRequest<'_>,
    ) -> Result<String, TranslationError> {
        if models.is_empty() {
            return Err(TranslationError::NoAvailableModel);
        }

        let last = models.len() - 1;
        for (i, model) in models.iter().enumerate() {
            tracing::debug!(model = %model, "trying gemini model");
            match self.generate(model, api_key, body).await {
                Attempt::Translated(text) => {
                    tracing::info!(model = %model, "gemini translation succeeded");
                    return Ok(text);
                }
                Attempt::NotFound => {
                    tracing::info!(model = %model, "gemini model not found, trying next");
                }
                Attempt::Failed(e) if i == last => return Err(e),
                Attempt::Failed(e) => {
                    tracing::warn!(model = %model, error = %e, "gemini model failed, trying next");
                }
            }
        }
        Err(TranslationError::AllModelsExhausted)
    }
}

fn extract_text(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let text = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    if text.is_empty() {
        return None;
    }
    Some(text.trim().to_string())
}

pub(crate) fn translation_prompt(text: &str, source: &str, target: &str) -> String {
    format!(
        "Translate the following text from {} to {}. Only return the translated text, no explanations: \"{}\"",
        source, target, text
    )
}

#[async_trait]
impl Translator for GeminiClient {
    async fn translate(&self, req: &TranslationRequest) -> Result<String, TranslationError> {
        if is_blank(&req.api_key) {
            return Err(TranslationError::InvalidKey {
                provider: Provider::Gemini,
            });
        }

        let models = self.candidates(&req.api_key).await;
        let prompt = translation_prompt(&req.text, &req.source_lang, &req.target_lang);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1000,
            }),
        };
        self.translate_with(&models, &req.api_key, &body).await
    }

    async fn test_key(&self, api_key: &str) -> KeyCheck {
        if is_blank(api_key) {
            return KeyCheck::failed("Enter a Gemini API key before testing");
        }

        let models = match self.discover(api_key).await {
            Ok(m) => m,
            Err(TranslationError::ProviderError { status, body, .. }) => {
                return KeyCheck::failed(format!("Cannot reach Gemini API: {} - {}", status, body));
            }
            Err(e) => return KeyCheck::failed(format!("Gemini connection error: {}", e)),
        };
        if models.is_empty() {
            return KeyCheck::failed("No Gemini model supports generateContent");
        }

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "Hello" }],
            }],
            generation_config: None,
        };
        for model in &models {
            let resp = self
                .client
                .post(self.generate_url(model))
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await;
            match resp {
                Ok(r) if r.status().is_success() => {
                    return KeyCheck::ok(format!("Gemini API key is valid (model: {})", model));
                }
                Ok(r) => {
                    tracing::debug!(model = %model, status = %r.status(), "key test call failed");
                }
                Err(e) => {
                    tracing::debug!(model = %model, error = %e, "key test call failed");
                }
            }
        }
        KeyCheck::failed("Models are available but none could generate content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_list_is_never_empty() {
        assert!(!FALLBACK_MODELS.is_empty());
        assert_eq!(FALLBACK_MODELS[0], "gemini-1.5-pro");
    }

    #[test]
    fn extracts_nested_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  Hello  "}]}}]}"#;
        assert_eq!(extract_text(body).as_deref(), Some("Hello"));
    }

    #[test]
    fn missing_text_path_is_none() {
        assert_eq!(extract_text(r#"{"candidates":[]}"#), None);
        assert_eq!(extract_text(r#"{"promptFeedback":{}}"#), None);
        assert_eq!(extract_text("not json"), None);
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1000,
            }),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn prompt_quotes_text() {
        let p = translation_prompt("xin chào", "vi", "en");
        assert!(p.starts_with("Translate the following text from vi to en."));
        assert!(p.ends_with("\"xin chào\""));
    }

    #[tokio::test]
    async fn empty_candidate_list_is_no_available_model() {
        let client = GeminiClient::new().with_base_url("http://127.0.0.1:9");
        let body = GenerateRequest {
            contents: vec![],
            generation_config: None,
        };
        let err = client.translate_with(&[], "key", &body).await.unwrap_err();
        assert!(matches!(err, TranslationError::NoAvailableModel));
    }
}
