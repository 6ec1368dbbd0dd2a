use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::StoreError;

pub const DEFAULT_TARGET_LANG: &str = "en";
pub const SOURCE_LANG: &str = "vi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAi => "OpenAI",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{}' (expected gemini or openai)", other)),
        }
    }
}

/// Persisted field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Api,
    TargetLang,
    AutoTranslate,
    GeminiKey,
    OpenAiKey,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::Api,
        SettingKey::TargetLang,
        SettingKey::AutoTranslate,
        SettingKey::GeminiKey,
        SettingKey::OpenAiKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Api => "api",
            SettingKey::TargetLang => "targetLang",
            SettingKey::AutoTranslate => "autoTranslate",
            SettingKey::GeminiKey => "geminiKey",
            SettingKey::OpenAiKey => "openaiKey",
        }
    }
}

/// A subset of the settings, as read from or written to a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialSettings {
    #[serde(rename = "api", skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(rename = "targetLang", skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(rename = "autoTranslate", skip_serializing_if = "Option::is_none")]
    pub auto_translate: Option<bool>,
    #[serde(rename = "geminiKey", skip_serializing_if = "Option::is_none")]
    pub gemini_key: Option<String>,
    #[serde(rename = "openaiKey", skip_serializing_if = "Option::is_none")]
    pub openai_key: Option<String>,
}

impl PartialSettings {
    /// Keeps only the requested fields.
    pub fn select(mut self, keys: &[SettingKey]) -> Self {
        if !keys.contains(&SettingKey::Api) {
            self.provider = None;
        }
        if !keys.contains(&SettingKey::TargetLang) {
            self.target_lang = None;
        }
        if !keys.contains(&SettingKey::AutoTranslate) {
            self.auto_translate = None;
        }
        if !keys.contains(&SettingKey::GeminiKey) {
            self.gemini_key = None;
        }
        if !keys.contains(&SettingKey::OpenAiKey) {
            self.openai_key = None;
        }
        self
    }

    /// Fields set in `other` win.
    pub fn merge(&mut self, other: PartialSettings) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.target_lang.is_some() {
            self.target_lang = other.target_lang;
        }
        if other.auto_translate.is_some() {
            self.auto_translate = other.auto_translate;
        }
        if other.gemini_key.is_some() {
            self.gemini_key = other.gemini_key;
        }
        if other.openai_key.is_some() {
            self.openai_key = other.openai_key;
        }
    }

    /// Stores one raw value. A value of the wrong shape is logged and left
    /// unset so the default applies.
    fn set_value(&mut self, key: SettingKey, value: &Value) {
        fn parse<T: serde::de::DeserializeOwned>(key: SettingKey, value: &Value) -> Option<T> {
            match serde_json::from_value(value.clone()) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(key = key.as_str(), %value, error = %e, "ignoring unreadable setting");
                    None
                }
            }
        }
        match key {
            SettingKey::Api => self.provider = parse(key, value),
            SettingKey::TargetLang => self.target_lang = parse(key, value),
            SettingKey::AutoTranslate => self.auto_translate = parse(key, value),
            SettingKey::GeminiKey => self.gemini_key = parse(key, value),
            SettingKey::OpenAiKey => self.openai_key = parse(key, value),
        }
    }

    fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Fully resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: Provider,
    pub target_lang: String,
    pub auto_translate: bool,
    pub gemini_key: Option<String>,
    pub openai_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_partial(PartialSettings::default())
    }
}

impl Settings {
    pub fn from_partial(p: PartialSettings) -> Self {
        Self {
            provider: p.provider.unwrap_or_default(),
            target_lang: p
                .target_lang
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TARGET_LANG.to_string()),
            auto_translate: p.auto_translate.unwrap_or(false),
            gemini_key: non_blank(p.gemini_key),
            openai_key: non_blank(p.openai_key),
        }
    }

    /// Stored key for `provider`, if non-blank.
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Gemini => self.gemini_key.as_deref(),
            Provider::OpenAi => self.openai_key.as_deref(),
        }
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Key-value settings persistence. No validation happens here.
pub trait SettingsStore: Send + Sync {
    fn get(&self, keys: &[SettingKey]) -> Result<PartialSettings, StoreError>;
    fn set(&self, patch: PartialSettings) -> Result<(), StoreError>;

    fn load(&self) -> Result<Settings, StoreError> {
        self.get(&SettingKey::ALL).map(Settings::from_partial)
    }
}

/// Flat JSON object on disk, `config.json` next to the executable by default.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let dir = exe.parent().unwrap_or(Path::new("."));
        dir.join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if s.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&s)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, keys: &[SettingKey]) -> Result<PartialSettings, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let map = self.read_map()?;
        let mut out = PartialSettings::default();
        for &key in keys {
            if let Some(v) = map.get(key.as_str()) {
                out.set_value(key, v);
            }
        }
        Ok(out)
    }

    fn set(&self, patch: PartialSettings) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // Unknown keys already in the file are preserved.
        let mut map = self.read_map()?;
        map.extend(patch.into_map());
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let s = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, s)?;
        Ok(())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<PartialSettings>,
}

impl MemoryStore {
    pub fn new(initial: PartialSettings) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, keys: &[SettingKey]) -> Result<PartialSettings, StoreError> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().select(keys))
    }

    fn set(&self, patch: PartialSettings) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.merge(patch);
        Ok(())
    }
}

/// Overlays environment variables on reads. Writes go straight through.
pub struct EnvOverrides<S> {
    inner: S,
    vars: HashMap<SettingKey, &'static str>,
}

impl<S: SettingsStore> EnvOverrides<S> {
    pub fn new(inner: S) -> Self {
        let vars = HashMap::from([
            (SettingKey::GeminiKey, "GEMINI_API_KEY"),
            (SettingKey::OpenAiKey, "OPENAI_API_KEY"),
            (SettingKey::TargetLang, "TARGET_LANG"),
        ]);
        Self { inner, vars }
    }

    fn env(&self, key: SettingKey) -> Option<String> {
        let name = self.vars.get(&key)?;
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<S: SettingsStore> SettingsStore for EnvOverrides<S> {
    fn get(&self, keys: &[SettingKey]) -> Result<PartialSettings, StoreError> {
        let mut out = self.inner.get(keys)?;
        for key in keys {
            let Some(v) = self.env(*key) else { continue };
            match key {
                SettingKey::GeminiKey => out.gemini_key = Some(v),
                SettingKey::OpenAiKey => out.openai_key = Some(v),
                SettingKey::TargetLang => out.target_lang = Some(v),
                _ => {}
            }
        }
        Ok(out)
    }

    fn set(&self, patch: PartialSettings) -> Result<(), StoreError> {
        self.inner.set(patch)
    }
}
