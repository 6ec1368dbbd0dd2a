use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::SettingKey;
use crate::error::RouteError;
use crate::host::{Field, FieldId, Message, Notice, Page, Sink, TabRouter};
use crate::orchestrator::Orchestrator;

pub const TRANSLATE_SELECTION: &str = "translate-selection";

const NO_SELECTION_NOTICE: &str = "Select the text to translate before pressing the shortcut";

/// Receives global shortcut commands and forwards them to the active page.
pub struct Background {
    tabs: Arc<dyn TabRouter>,
}

impl Background {
    pub fn new(tabs: Arc<dyn TabRouter>) -> Self {
        Self { tabs }
    }

    /// Routing failures are logged, never surfaced.
    pub fn handle_command(&self, command: &str) {
        if command != TRANSLATE_SELECTION {
            tracing::debug!(command, "ignoring unknown command");
            return;
        }

        let tab = match self.tabs.active_tab() {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                tracing::debug!("no active tab for shortcut");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "error querying tabs");
                return;
            }
        };

        if let Err(e) = self.tabs.send(tab, Message::Translate) {
            tracing::error!(tab, error = %e, "error sending message to page");
        }
    }
}

/// Tab router backed by a single in-process channel, for hosts with one page.
pub struct ChannelRouter {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelRouter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TabRouter for ChannelRouter {
    fn active_tab(&self) -> Result<Option<u64>, RouteError> {
        Ok(if self.tx.is_closed() { None } else { Some(0) })
    }

    fn send(&self, tab: u64, message: Message) -> Result<(), RouteError> {
        self.tx.send(message).map_err(|_| RouteError::Closed(tab))
    }
}

/// Page-side handler: answers `translate` messages and owns the
/// auto-translate watcher.
#[derive(Clone)]
pub struct ContentScript {
    orchestrator: Arc<Orchestrator>,
    page: Arc<dyn Page>,
}

impl ContentScript {
    pub fn new(orchestrator: Arc<Orchestrator>, page: Arc<dyn Page>) -> Self {
        Self { orchestrator, page }
    }

    pub fn watcher(&self) -> AutoTranslateWatcher {
        AutoTranslateWatcher {
            orchestrator: Arc::clone(&self.orchestrator),
            page: Arc::clone(&self.page),
        }
    }

    /// Reads `autoTranslate` and, if set, attaches the watcher to the fields
    /// already on the page. Returns the watcher when auto-translate is on.
    pub fn initialize(&self) -> Option<AutoTranslateWatcher> {
        let enabled = match self.orchestrator.store().get(&[SettingKey::AutoTranslate]) {
            Ok(p) => p.auto_translate.unwrap_or(false),
            Err(e) => {
                tracing::error!(error = %e, "failed to read autoTranslate");
                false
            }
        };
        if !enabled {
            return None;
        }

        let watcher = self.watcher();
        let attached = watcher.on_fields_added(&self.page.fields());
        tracing::info!(attached, "auto-translate enabled");
        Some(watcher)
    }

    /// Returns the translation written to the page, `None` when the user
    /// was shown an error instead.
    pub async fn handle_message(&self, message: Message) -> Option<String> {
        match message {
            Message::Translate => {
                let selected = self
                    .page
                    .selected_text()
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                if selected.is_empty() {
                    self.page.notify(Notice::error(NO_SELECTION_NOTICE));
                    return None;
                }
                self.orchestrator
                    .run_translation(self.page.as_ref(), &selected, Sink::Selection)
                    .await
            }
        }
    }

    /// Handles messages until the channel closes. Each message runs on its
    /// own task, so slow translations do not hold up later ones.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_message(message).await;
            });
        }
        tracing::debug!("message channel closed");
    }
}

/// Translates text fields when they lose focus.
#[derive(Clone)]
pub struct AutoTranslateWatcher {
    orchestrator: Arc<Orchestrator>,
    page: Arc<dyn Page>,
}

impl AutoTranslateWatcher {
    /// Attaches to newly discovered elements; only text inputs and textareas
    /// are watched and each at most once. Returns how many were attached.
    pub fn on_fields_added(&self, fields: &[Field]) -> usize {
        let tracked = self.orchestrator.tracked();
        fields
            .iter()
            .filter(|f| f.kind.is_watched())
            .filter(|f| tracked.start_listening(f.id))
            .count()
    }

    pub fn on_field_removed(&self, field: FieldId) {
        self.orchestrator.tracked().forget(field);
    }

    /// Translates the field if its trimmed text changed since it was last
    /// tracked. Returns the translated text when one was written.
    pub async fn on_blur(&self, field: FieldId, value: &str) -> Option<String> {
        let tracked = self.orchestrator.tracked();
        if !tracked.is_listening(field) {
            return None;
        }

        let text = value.trim();
        if text.is_empty() || !tracked.record_if_changed(field, text) {
            return None;
        }

        self.orchestrator
            .run_translation(self.page.as_ref(), text, Sink::Input(field))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRouter {
        sent: Mutex<Vec<(u64, Message)>>,
        no_tab: bool,
        query_fails: bool,
    }

    impl TabRouter for RecordingRouter {
        fn active_tab(&self) -> Result<Option<u64>, RouteError> {
            if self.query_fails {
                return Err(RouteError::Query("no window".into()));
            }
            Ok(if self.no_tab { None } else { Some(42) })
        }

        fn send(&self, tab: u64, message: Message) -> Result<(), RouteError> {
            self.sent.lock().unwrap().push((tab, message));
            Ok(())
        }
    }

    #[test]
    fn shortcut_forwards_translate_to_active_tab() {
        let router = Arc::new(RecordingRouter::default());
        let bg = Background::new(router.clone());
        bg.handle_command(TRANSLATE_SELECTION);
        bg.handle_command("open-options");
        assert_eq!(*router.sent.lock().unwrap(), vec![(42, Message::Translate)]);
    }

    #[test]
    fn shortcut_without_tab_sends_nothing() {
        let router = Arc::new(RecordingRouter {
            no_tab: true,
            ..Default::default()
        });
        Background::new(router.clone()).handle_command(TRANSLATE_SELECTION);
        assert!(router.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_tab_query_sends_nothing() {
        let router = Arc::new(RecordingRouter {
            query_fails: true,
            ..Default::default()
        });
        Background::new(router.clone()).handle_command(TRANSLATE_SELECTION);
        assert!(router.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn closed_channel_is_a_route_error() {
        let (router, rx) = ChannelRouter::channel();
        drop(rx);
        assert_eq!(router.active_tab(), Ok(None));
        assert_eq!(router.send(7, Message::Translate), Err(RouteError::Closed(7)));
    }

    #[tokio::test]
    async fn channel_router_delivers() {
        let (router, mut rx) = ChannelRouter::channel();
        Background::new(Arc::new(router)).handle_command(TRANSLATE_SELECTION);
        assert_eq!(rx.recv().await, Some(Message::Translate));
    }
}
