use async_trait::async_trait;

use super::{body_text, is_blank, KeyCheck, TranslationRequest, Translator, CLIENT};
use crate::config::Provider;
use crate::error::TranslationError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(serde::Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Single-shot chat-completion client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            client: CLIENT.clone(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn extract_content(body: &str) -> Option<String> {
    let parsed: ChatResponse = serde_json::from_str(body).ok()?;
    parsed
        .choices
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|c| !c.is_empty())
        .map(|c| c.trim().to_string())
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, req: &TranslationRequest) -> Result<String, TranslationError> {
        if is_blank(&req.api_key) {
            return Err(TranslationError::InvalidKey {
                provider: Provider::OpenAi,
            });
        }

        let content = format!(
            "Translate the following text from {} to {}: \"{}\"",
            req.source_lang, req.target_lang, req.text
        );
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &content,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&req.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = body_text(resp).await;
            tracing::error!(status = status.as_u16(), %body, "openai request failed");
            return Err(TranslationError::ProviderError {
                provider: Provider::OpenAi,
                model: None,
                status: status.as_u16(),
                body,
            });
        }

        let text = body_text(resp).await;
        extract_content(&text).ok_or(TranslationError::MalformedResponse {
            provider: Provider::OpenAi,
            model: None,
            body: text,
        })
    }

    async fn test_key(&self, api_key: &str) -> KeyCheck {
        if is_blank(api_key) {
            return KeyCheck::failed("Enter an OpenAI API key before testing");
        }

        let resp = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => KeyCheck::ok("OpenAI API key is valid"),
            Ok(r) => {
                let status = r.status().as_u16();
                KeyCheck::failed(format!("OpenAI API error: {} - {}", status, body_text(r).await))
            }
            Err(e) => KeyCheck::failed(format!("API test error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Bonjour \n"}},{"message":{"content":"x"}}]}"#;
        assert_eq!(extract_content(body).as_deref(), Some("Bonjour"));
    }

    #[test]
    fn missing_content_is_none() {
        assert_eq!(extract_content(r#"{"choices":[]}"#), None);
        assert_eq!(extract_content(r#"{"choices":[{"message":{}}]}"#), None);
        assert_eq!(extract_content(r#"{"error":{"message":"bad"}}"#), None);
    }

    #[test]
    fn default_model() {
        let c = OpenAiClient::new();
        assert_eq!(c.model, "gpt-3.5-turbo");
        assert_eq!(c.with_model("gpt-4o-mini").model, "gpt-4o-mini");
    }
}
