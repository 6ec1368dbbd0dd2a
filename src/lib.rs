//! Translate selected or typed text through Gemini or OpenAI and write the
//! result back where it came from.

pub mod config;
pub mod error;
pub mod forms;
pub mod host;
pub mod logger;
pub mod orchestrator;
pub mod provider;
pub mod trigger;

pub use config::{Provider, Settings, SettingsStore};
pub use error::{RouteError, StoreError, TranslationError};
pub use orchestrator::{Orchestrator, TrackedInputs};
