use std::sync::Arc;

use autotrans::config::{
    EnvOverrides, JsonFileStore, MemoryStore, PartialSettings, Provider, SettingKey, Settings,
    SettingsStore,
};
use autotrans::forms::{PopupForm, PopupValues};
use autotrans::host::Severity;

#[test]
fn round_trip_through_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("config.json"));

    store
        .set(PartialSettings {
            provider: Some(Provider::OpenAi),
            target_lang: Some("fr".into()),
            ..Default::default()
        })
        .unwrap();

    let got = store.get(&[SettingKey::Api, SettingKey::TargetLang]).unwrap();
    assert_eq!(got.provider, Some(Provider::OpenAi));
    assert_eq!(got.target_lang.as_deref(), Some("fr"));

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["api"], "openai");
    assert_eq!(v["targetLang"], "fr");
}

#[test]
fn missing_file_reads_as_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("nested").join("config.json"));

    let got = store.get(&SettingKey::ALL).unwrap();
    assert_eq!(got, PartialSettings::default());

    let settings = store.load().unwrap();
    assert_eq!(settings.provider, Provider::Gemini);
    assert_eq!(settings.target_lang, "en");
    assert!(!settings.auto_translate);
}

#[test]
fn set_merges_and_keeps_unknown_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "theme": "dark", "geminiKey": "old" }"#).unwrap();
    let store = JsonFileStore::new(&path);

    store
        .set(PartialSettings {
            auto_translate: Some(true),
            ..Default::default()
        })
        .unwrap();

    let got = store.get(&SettingKey::ALL).unwrap();
    assert_eq!(got.gemini_key.as_deref(), Some("old"));
    assert_eq!(got.auto_translate, Some(true));
    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["theme"], "dark");
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(JsonFileStore::new(&path).get(&SettingKey::ALL).is_err());
}

#[test]
fn bad_value_falls_back_to_default_and_popup_repairs_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "api": "deepl", "autoTranslate": "yes", "geminiKey": "AIzaSyTestKey0123456789" }"#,
    )
    .unwrap();
    let store = Arc::new(JsonFileStore::new(&path));

    let settings = store.load().unwrap();
    assert_eq!(settings.provider, Provider::Gemini);
    assert!(!settings.auto_translate);
    assert_eq!(settings.gemini_key.as_deref(), Some("AIzaSyTestKey0123456789"));

    let notice = PopupForm::new(store.clone()).save(&PopupValues {
        provider: Provider::Gemini,
        target_lang: "fr".into(),
        auto_translate: true,
    });
    assert_eq!(notice.severity, Severity::Success, "{}", notice.message);

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["api"], "gemini");
    assert_eq!(v["autoTranslate"], true);
    assert_eq!(v["targetLang"], "fr");
}

#[test]
fn memory_store_round_trip_and_defaults() {
    let store = MemoryStore::default();
    store
        .set(PartialSettings {
            provider: Some(Provider::OpenAi),
            target_lang: Some("fr".into()),
            ..Default::default()
        })
        .unwrap();

    let s: Settings = store.load().unwrap();
    assert_eq!(s.provider, Provider::OpenAi);
    assert_eq!(s.target_lang, "fr");
    assert_eq!(s.openai_key, None);
}

#[test]
fn env_overrides_apply_to_requested_keys_only() {
    // Only this test touches these variables.
    std::env::set_var("TARGET_LANG", "ja");
    std::env::set_var("OPENAI_API_KEY", "sk-from-env-0123456789abc");

    let store = EnvOverrides::new(MemoryStore::new(PartialSettings {
        target_lang: Some("fr".into()),
        ..Default::default()
    }));

    let got = store.get(&[SettingKey::TargetLang]).unwrap();
    assert_eq!(got.target_lang.as_deref(), Some("ja"));
    assert_eq!(got.openai_key, None);

    let s = store.load().unwrap();
    assert_eq!(s.openai_key.as_deref(), Some("sk-from-env-0123456789abc"));

    std::env::remove_var("TARGET_LANG");
    std::env::remove_var("OPENAI_API_KEY");
}
