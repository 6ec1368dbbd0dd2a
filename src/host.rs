//! Capabilities the translation flow needs from whatever hosts it: a web
//! page, the desktop clipboard, or a terminal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RouteError;

/// Auto-dismiss delay for translation notices.
pub const RESULT_NOTICE_DELAY: Duration = Duration::from_secs(3);
/// Auto-dismiss delay for settings-form notices.
pub const SETTINGS_NOTICE_DELAY: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// A transient banner shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub dismiss_after: Duration,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            dismiss_after: RESULT_NOTICE_DELAY,
        }
    }

    pub fn lasting(mut self, delay: Duration) -> Self {
        self.dismiss_after = delay;
        self
    }
}

/// Host-issued handle for an editable element. Holding one does not keep the
/// element alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    TextInput,
    TextArea,
    Other,
}

impl FieldKind {
    /// Whether auto-translate watches this kind of element.
    pub fn is_watched(&self) -> bool {
        matches!(self, FieldKind::TextInput | FieldKind::TextArea)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub kind: FieldKind,
}

/// Where a translation result goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Selection,
    Input(FieldId),
}

/// One page (or page-like host) the content side runs against.
pub trait Page: Send + Sync {
    /// Current text selection, untrimmed. `None` when nothing is selected.
    fn selected_text(&self) -> Option<String>;

    /// Replaces the current selection. Returns false when there is no
    /// selection range to replace.
    fn replace_selection(&self, text: &str) -> bool;

    fn set_field_value(&self, field: FieldId, text: &str);

    /// Editable elements currently on the page.
    fn fields(&self) -> Vec<Field>;

    fn notify(&self, notice: Notice);
}

/// Inter-context message sent from the shortcut handler to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Message {
    Translate,
}

/// Finds the active page and delivers messages to it.
pub trait TabRouter: Send + Sync {
    fn active_tab(&self) -> Result<Option<u64>, RouteError>;

    /// Delivery acknowledgement only; no response payload.
    fn send(&self, tab: u64, message: Message) -> Result<(), RouteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_message_wire_format() {
        let json = serde_json::to_string(&Message::Translate).unwrap();
        assert_eq!(json, r#"{"action":"translate"}"#);
        let back: Message = serde_json::from_str(r#"{ "action": "translate" }"#).unwrap();
        assert_eq!(back, Message::Translate);
    }

    #[test]
    fn notice_delays() {
        assert_eq!(Notice::info("x").dismiss_after, Duration::from_secs(3));
        let n = Notice::success("saved").lasting(SETTINGS_NOTICE_DELAY);
        assert_eq!(n.dismiss_after, Duration::from_secs(4));
    }

    #[test]
    fn only_text_fields_are_watched() {
        assert!(FieldKind::TextInput.is_watched());
        assert!(FieldKind::TextArea.is_watched());
        assert!(!FieldKind::Other.is_watched());
    }
}
