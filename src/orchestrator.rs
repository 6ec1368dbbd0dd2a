use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{Provider, SettingsStore, SOURCE_LANG};
use crate::host::{FieldId, Notice, Page, Sink};
use crate::provider::{GeminiClient, OpenAiClient, TranslationRequest, Translator};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FieldState {
    listening: bool,
    last_value: Option<String>,
}

/// Per-field memory of the blur listener flag and the last value translated
/// (or written) for that field.
#[derive(Debug, Default)]
pub struct TrackedInputs {
    fields: Mutex<HashMap<FieldId, FieldState>>,
}

impl TrackedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the field as listened to. Returns false if it already was.
    pub fn start_listening(&self, field: FieldId) -> bool {
        let mut fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        let state = fields.entry(field).or_default();
        !std::mem::replace(&mut state.listening, true)
    }

    pub fn is_listening(&self, field: FieldId) -> bool {
        let fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        fields.get(&field).map(|s| s.listening).unwrap_or(false)
    }

    pub fn last_value(&self, field: FieldId) -> Option<String> {
        let fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        fields.get(&field).and_then(|s| s.last_value.clone())
    }

    pub fn record(&self, field: FieldId, value: &str) {
        let mut fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        fields.entry(field).or_default().last_value = Some(value.to_string());
    }

    /// Records `value` unless it equals the tracked one. Returns true when it
    /// was recorded, i.e. the caller should translate.
    pub fn record_if_changed(&self, field: FieldId, value: &str) -> bool {
        let mut fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        let state = fields.entry(field).or_default();
        if state.last_value.as_deref() == Some(value) {
            return false;
        }
        state.last_value = Some(value.to_string());
        true
    }

    /// Drops everything known about a field the host removed.
    pub fn forget(&self, field: FieldId) {
        let mut fields = self.fields.lock().unwrap_or_else(|e| e.into_inner());
        fields.remove(&field);
    }

    pub fn len(&self) -> usize {
        self.fields.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads settings, picks the provider, runs the translation and writes the
/// result to its sink. Failures end up as notices on the page.
pub struct Orchestrator {
    store: Arc<dyn SettingsStore>,
    gemini: Arc<dyn Translator>,
    openai: Arc<dyn Translator>,
    tracked: Arc<TrackedInputs>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        gemini: Arc<dyn Translator>,
        openai: Arc<dyn Translator>,
    ) -> Self {
        Self {
            store,
            gemini,
            openai,
            tracked: Arc::new(TrackedInputs::new()),
        }
    }

    pub fn with_default_clients(store: Arc<dyn SettingsStore>) -> Self {
        Self::new(store, Arc::new(GeminiClient::new()), Arc::new(OpenAiClient::new()))
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub fn tracked(&self) -> &Arc<TrackedInputs> {
        &self.tracked
    }

    pub fn translator(&self, provider: Provider) -> &Arc<dyn Translator> {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::OpenAi => &self.openai,
        }
    }

    /// Returns the translated text when it reached the sink.
    pub async fn run_translation(&self, page: &dyn Page, text: &str, sink: Sink) -> Option<String> {
        let settings = match self.store.load() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to load settings");
                page.notify(Notice::error(format!("Translation error: {}", e)));
                return None;
            }
        };

        let provider = settings.provider;
        let Some(api_key) = settings.key_for(provider) else {
            tracing::warn!(%provider, "no API key configured");
            page.notify(Notice::error(format!(
                "Please configure the {} API key in Options",
                provider
            )));
            return None;
        };

        let req = TranslationRequest {
            text: text.to_string(),
            source_lang: SOURCE_LANG.to_string(),
            target_lang: settings.target_lang.clone(),
            provider,
            api_key: api_key.to_string(),
        };

        tracing::info!(
            chars = text.chars().count(),
            %provider,
            target = %req.target_lang,
            "translating"
        );
        let translated = match self.translator(provider).translate(&req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "translation failed");
                page.notify(Notice::error(format!("Translation error: {}", e)));
                return None;
            }
        };

        match sink {
            Sink::Selection => {
                if !page.replace_selection(&translated) {
                    tracing::info!("selection vanished before the translation arrived");
                    return None;
                }
                page.notify(Notice::success("Translated successfully!"));
            }
            Sink::Input(field) => {
                page.set_field_value(field, &translated);
                self.tracked.record(field, &translated);
            }
        }
        Some(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_listening_is_once_per_field() {
        let t = TrackedInputs::new();
        assert!(t.start_listening(FieldId(1)));
        assert!(!t.start_listening(FieldId(1)));
        assert!(t.start_listening(FieldId(2)));
        assert!(t.is_listening(FieldId(1)));
    }

    #[test]
    fn record_if_changed_compares_and_sets() {
        let t = TrackedInputs::new();
        assert!(t.record_if_changed(FieldId(7), "xin chào"));
        assert!(!t.record_if_changed(FieldId(7), "xin chào"));
        assert!(t.record_if_changed(FieldId(7), "chào buổi sáng"));
        assert_eq!(t.last_value(FieldId(7)).as_deref(), Some("chào buổi sáng"));
    }

    #[test]
    fn forget_drops_field() {
        let t = TrackedInputs::new();
        t.record(FieldId(3), "hello");
        t.start_listening(FieldId(3));
        t.forget(FieldId(3));
        assert!(t.is_empty());
        assert!(!t.is_listening(FieldId(3)));
    }
}
