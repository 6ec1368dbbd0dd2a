//! Options and popup forms: key entry, key testing and the quick settings.

use std::sync::Arc;

use crate::config::{PartialSettings, Provider, SettingKey, Settings, SettingsStore};
use crate::host::{Notice, SETTINGS_NOTICE_DELAY};
use crate::provider::{KeyCheck, Translator};

const MIN_KEY_LEN: usize = 20;

/// Local sanity check of a key's format. Not a security boundary.
///
/// The same policy applies when saving and before a live key test.
pub fn validate_key(provider: Provider, key: &str) -> bool {
    let key = key.trim();
    if key.len() < MIN_KEY_LEN {
        return false;
    }
    match provider {
        Provider::Gemini => key.contains("AIza") || key.contains("ya29"),
        Provider::OpenAi => key.starts_with("sk-"),
    }
}

fn settings_notice(notice: Notice) -> Notice {
    notice.lasting(SETTINGS_NOTICE_DELAY)
}

/// API key management.
pub struct OptionsForm {
    store: Arc<dyn SettingsStore>,
}

impl OptionsForm {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Stored keys, blank when unset.
    pub fn load(&self) -> (String, String) {
        match self.store.get(&[SettingKey::GeminiKey, SettingKey::OpenAiKey]) {
            Ok(p) => (p.gemini_key.unwrap_or_default(), p.openai_key.unwrap_or_default()),
            Err(e) => {
                tracing::error!(error = %e, "failed to read keys");
                (String::new(), String::new())
            }
        }
    }

    /// Saves both keys. A blank key clears that provider; a non-blank key
    /// must pass [`validate_key`]. Nothing is written if either is rejected.
    pub fn save(&self, gemini: &str, openai: &str) -> Notice {
        let gemini = gemini.trim();
        let openai = openai.trim();

        if !gemini.is_empty() && !validate_key(Provider::Gemini, gemini) {
            return settings_notice(Notice::error("Gemini API key has an invalid format"));
        }
        if !openai.is_empty() && !validate_key(Provider::OpenAi, openai) {
            return settings_notice(Notice::error("OpenAI API key has an invalid format"));
        }

        let patch = PartialSettings {
            gemini_key: Some(gemini.to_string()),
            openai_key: Some(openai.to_string()),
            ..Default::default()
        };
        match self.store.set(patch) {
            Ok(()) => settings_notice(Notice::success("API keys saved")),
            Err(e) => settings_notice(Notice::error(format!("Could not save API keys: {}", e))),
        }
    }

    /// Live key test through the provider client.
    pub async fn test_key(&self, provider: Provider, key: &str, client: &dyn Translator) -> Notice {
        let key = key.trim();
        if key.is_empty() {
            return settings_notice(Notice::error(format!(
                "Enter a {} API key before testing",
                provider
            )));
        }
        if !validate_key(provider, key) {
            return settings_notice(Notice::error(format!(
                "{} API key has an invalid format",
                provider
            )));
        }

        let KeyCheck { success, message } = client.test_key(key).await;
        tracing::info!(%provider, success, "key test finished");
        if success {
            settings_notice(Notice::success(message))
        } else {
            settings_notice(Notice::error(message))
        }
    }
}

/// Values shown in the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupValues {
    pub provider: Provider,
    pub target_lang: String,
    pub auto_translate: bool,
}

/// Provider, target language and auto-translate switch.
pub struct PopupForm {
    store: Arc<dyn SettingsStore>,
}

impl PopupForm {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> PopupValues {
        let settings = self.store.load().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to read settings");
            Default::default()
        });
        PopupValues {
            provider: settings.provider,
            target_lang: settings.target_lang,
            auto_translate: settings.auto_translate,
        }
    }

    /// Refuses to activate a provider that has no stored key.
    pub fn save(&self, values: &PopupValues) -> Notice {
        // Only the keys are needed; other stored values are about to be replaced.
        let keys = match self.store.get(&[SettingKey::GeminiKey, SettingKey::OpenAiKey]) {
            Ok(p) => Settings::from_partial(p),
            Err(e) => return settings_notice(Notice::error(format!("Could not read settings: {}", e))),
        };
        if keys.key_for(values.provider).is_none() {
            return settings_notice(Notice::error(format!(
                "Configure the {} API key in Options first",
                values.provider
            )));
        }

        let patch = PartialSettings {
            provider: Some(values.provider),
            target_lang: Some(values.target_lang.trim().to_string()),
            auto_translate: Some(values.auto_translate),
            ..Default::default()
        };
        match self.store.set(patch) {
            Ok(()) => settings_notice(Notice::success("Settings saved")),
            Err(e) => settings_notice(Notice::error(format!("Could not save settings: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::host::Severity;

    const GEMINI_KEY: &str = "AIzaSyA1234567890abcdefghij";
    const OPENAI_KEY: &str = "sk-abcdefghijklmnopqrstuv";

    #[test]
    fn key_format_policy() {
        assert!(validate_key(Provider::Gemini, GEMINI_KEY));
        assert!(validate_key(Provider::Gemini, "ya29.a0AfH6SMBxxxxxxxxxxxxx"));
        assert!(!validate_key(Provider::Gemini, "AIza-short"));
        assert!(!validate_key(Provider::Gemini, OPENAI_KEY));
        assert!(validate_key(Provider::OpenAi, &format!("  {}  ", OPENAI_KEY)));
        assert!(!validate_key(Provider::OpenAi, "pk-abcdefghijklmnopqrstuv"));
        assert!(!validate_key(Provider::OpenAi, ""));
    }

    #[test]
    fn options_rejects_bad_key_without_writing() {
        let store = Arc::new(MemoryStore::default());
        let form = OptionsForm::new(store.clone());
        let notice = form.save(GEMINI_KEY, "not-a-key");
        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(notice.dismiss_after, SETTINGS_NOTICE_DELAY);
        assert_eq!(form.load(), (String::new(), String::new()));
    }

    #[test]
    fn options_saves_trimmed_keys() {
        let store = Arc::new(MemoryStore::default());
        let form = OptionsForm::new(store.clone());
        let notice = form.save(&format!(" {} ", GEMINI_KEY), "");
        assert_eq!(notice.severity, Severity::Success);
        assert_eq!(form.load(), (GEMINI_KEY.to_string(), String::new()));
    }

    struct StubClient;

    #[async_trait::async_trait]
    impl Translator for StubClient {
        async fn translate(
            &self,
            _req: &crate::provider::TranslationRequest,
        ) -> Result<String, crate::error::TranslationError> {
            unreachable!("key tests never translate")
        }

        async fn test_key(&self, _api_key: &str) -> KeyCheck {
            KeyCheck::failed("OpenAI API error: 401 - bad key")
        }
    }

    #[tokio::test]
    async fn key_test_checks_format_before_calling() {
        let form = OptionsForm::new(Arc::new(MemoryStore::default()));

        let notice = form.test_key(Provider::OpenAi, "sk-short", &StubClient).await;
        assert!(notice.message.contains("invalid format"));

        let notice = form.test_key(Provider::OpenAi, OPENAI_KEY, &StubClient).await;
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.message.contains("401"));
    }

    #[test]
    fn popup_requires_key_for_provider() {
        let store = Arc::new(MemoryStore::new(PartialSettings {
            gemini_key: Some(GEMINI_KEY.into()),
            ..Default::default()
        }));
        let form = PopupForm::new(store.clone());

        let values = PopupValues {
            provider: Provider::OpenAi,
            target_lang: "fr".into(),
            auto_translate: true,
        };
        assert_eq!(form.save(&values).severity, Severity::Error);
        assert_eq!(form.load().provider, Provider::Gemini);

        let values = PopupValues {
            provider: Provider::Gemini,
            ..values
        };
        assert_eq!(form.save(&values).severity, Severity::Success);
        assert_eq!(form.load(), values);
    }
}
