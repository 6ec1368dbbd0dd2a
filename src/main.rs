use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};

use autotrans::config::{EnvOverrides, JsonFileStore, Provider, SettingsStore};
use autotrans::forms::{OptionsForm, PopupForm, PopupValues};
use autotrans::host::{Field, FieldId, Message, Notice, Page, Severity};
use autotrans::logger;
use autotrans::orchestrator::Orchestrator;
use autotrans::trigger::{Background, ChannelRouter, ContentScript, TRANSLATE_SELECTION};

#[cfg(windows)]
mod win_hotkey {
    use std::thread;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse as km;
    use windows::Win32::UI::WindowsAndMessaging as wm;

    pub const HOTKEY_ID: i32 = 1;

    /// Registers Alt+F3 and sends the shortcut command for every press.
    pub fn spawn_hotkey_listener(tx: std::sync::mpsc::Sender<&'static str>) {
        thread::spawn(move || unsafe {
            let modifiers = km::HOT_KEY_MODIFIERS(km::MOD_ALT.0 as u32);
            if km::RegisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID, modifiers, km::VK_F3.0 as u32).is_err() {
                tracing::error!("RegisterHotKey Alt+F3 failed");
                crate::toast("autotrans", "Failed to register Alt+F3 hotkey (in use?)");
            } else {
                tracing::info!("RegisterHotKey Alt+F3 ok");
            }
            loop {
                let mut msg = wm::MSG::default();
                let got = wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0);
                if got.0 == -1 {
                    tracing::error!("GetMessageW returned -1, leaving hotkey loop");
                    break;
                }
                if msg.message == wm::WM_HOTKEY {
                    tracing::debug!("WM_HOTKEY received");
                    if tx.send(super::TRANSLATE_SELECTION).is_err() {
                        break;
                    }
                }
                let _ = wm::TranslateMessage(&msg);
                wm::DispatchMessageW(&msg);
            }
            let _ = km::UnregisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID);
        });
    }
}

#[cfg(not(windows))]
mod win_hotkey {
    pub fn spawn_hotkey_listener(_tx: std::sync::mpsc::Sender<&'static str>) {
        tracing::warn!(command = super::TRANSLATE_SELECTION, "global hotkey is only available on Windows");
    }
}

fn read_clipboard_string() -> Option<String> {
    #[cfg(windows)]
    {
        clipboard_win::get_clipboard_string().ok()
    }
    #[cfg(not(windows))]
    {
        None
    }
}

fn write_clipboard_string(s: &str) -> bool {
    #[cfg(windows)]
    {
        clipboard_win::set_clipboard_string(s).is_ok()
    }
    #[cfg(not(windows))]
    {
        let _ = s;
        false
    }
}

fn toast(title: &str, body: &str) {
    #[cfg(windows)]
    {
        let _ = winrt_notification::Toast::new(winrt_notification::Toast::POWERSHELL_APP_ID)
            .title(title)
            .text1(body)
            .show();
    }
    #[cfg(not(windows))]
    {
        eprintln!("[{}] {}", title, body);
    }
}

/// Desktop host: the clipboard is the selection, toasts are the notices.
struct ClipboardPage;

impl Page for ClipboardPage {
    fn selected_text(&self) -> Option<String> {
        read_clipboard_string()
    }

    fn replace_selection(&self, text: &str) -> bool {
        let ok = write_clipboard_string(text);
        if !ok {
            tracing::warn!("failed to write clipboard");
        }
        ok
    }

    fn set_field_value(&self, field: FieldId, _text: &str) {
        tracing::debug!(?field, "clipboard host has no input fields");
    }

    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    fn notify(&self, notice: Notice) {
        tracing::info!(severity = ?notice.severity, message = %notice.message, "notice");
        toast("autotrans", &notice.message);
    }
}

/// One-shot host: the argument is the selection, stdout receives the result.
struct ConsolePage {
    text: String,
}

impl Page for ConsolePage {
    fn selected_text(&self) -> Option<String> {
        Some(self.text.clone())
    }

    fn replace_selection(&self, text: &str) -> bool {
        println!("{}", text);
        true
    }

    fn set_field_value(&self, _field: FieldId, text: &str) {
        println!("{}", text);
    }

    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    fn notify(&self, notice: Notice) {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.severity {
        Severity::Success => "ok",
        Severity::Error => "error",
        Severity::Info => "info",
    };
    eprintln!("[{}] {}", tag, notice.message);
}

#[derive(Parser)]
#[command(name = "autotrans", version, about = "Translate selected text via Gemini or OpenAI")]
struct Cli {
    /// Settings file (defaults to config.json next to the executable)
    #[arg(long, global = true, env = "AUTOTRANS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for Alt+F3 and translate the clipboard in place
    Run,
    /// Translate TEXT once and print the result
    Translate { text: Vec<String> },
    /// Save API keys (blank clears a key)
    Options {
        #[arg(long, default_value = "")]
        gemini_key: String,
        #[arg(long, default_value = "")]
        openai_key: String,
    },
    /// Choose the provider, target language and auto-translate switch
    Popup {
        #[arg(long)]
        provider: Option<Provider>,
        #[arg(long)]
        target_lang: Option<String>,
        /// Translate text fields on blur. `run` reads it at startup; the
        /// clipboard host has no fields, so only hosts that expose them act on it
        #[arg(long)]
        auto_translate: Option<bool>,
    },
    /// Check that an API key works against the live API
    TestKey {
        provider: Provider,
        /// Key to test (defaults to the stored one)
        #[arg(long)]
        key: Option<String>,
    },
    /// Print the current settings
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logger::init();
    tracing::info!("autotrans starting");

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(JsonFileStore::default_path);
    let store: Arc<dyn SettingsStore> = Arc::new(EnvOverrides::new(JsonFileStore::new(path)));
    let orchestrator = Arc::new(Orchestrator::with_default_clients(Arc::clone(&store)));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            run_daemon(orchestrator).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Translate { text } => {
            let text = text.join(" ");
            let content = ContentScript::new(Arc::clone(&orchestrator), Arc::new(ConsolePage { text }));
            // Failures were already printed as notices.
            match content.handle_message(Message::Translate).await {
                Some(_) => Ok(ExitCode::SUCCESS),
                None => Ok(ExitCode::FAILURE),
            }
        }
        Command::Options { gemini_key, openai_key } => {
            let notice = OptionsForm::new(store).save(&gemini_key, &openai_key);
            finish(&notice)
        }
        Command::Popup {
            provider,
            target_lang,
            auto_translate,
        } => {
            let form = PopupForm::new(store);
            let current = form.load();
            let values = PopupValues {
                provider: provider.unwrap_or(current.provider),
                target_lang: target_lang.unwrap_or(current.target_lang),
                auto_translate: auto_translate.unwrap_or(current.auto_translate),
            };
            finish(&form.save(&values))
        }
        Command::TestKey { provider, key } => {
            let form = OptionsForm::new(Arc::clone(&store));
            let key = match key {
                Some(k) => k,
                None => {
                    let (gemini, openai) = form.load();
                    match provider {
                        Provider::Gemini => gemini,
                        Provider::OpenAi => openai,
                    }
                }
            };
            let notice = form
                .test_key(provider, &key, orchestrator.translator(provider).as_ref())
                .await;
            finish(&notice)
        }
        Command::Show => {
            let settings = store.load().context("reading settings")?;
            println!("provider:       {}", settings.provider.as_str());
            println!("target lang:    {}", settings.target_lang);
            println!("auto translate: {}", settings.auto_translate);
            println!("gemini key:     {}", mask(settings.gemini_key.as_deref()));
            println!("openai key:     {}", mask(settings.openai_key.as_deref()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn finish(notice: &Notice) -> anyhow::Result<ExitCode> {
    print_notice(notice);
    Ok(match notice.severity {
        Severity::Error => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn mask(key: Option<&str>) -> String {
    match key {
        Some(k) if k.chars().count() > 10 => format!("{}...", k.chars().take(10).collect::<String>()),
        Some(_) => "(set)".to_string(),
        None => "(not set)".to_string(),
    }
}

async fn run_daemon(orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let settings = orchestrator.store().load().context("reading settings")?;
    if settings.key_for(settings.provider).is_none() {
        toast("autotrans", &format!("Set the {} API key first.", settings.provider));
    } else {
        toast("autotrans", "Ready. Press Alt+F3 to translate the clipboard.");
    }

    let (router, rx) = ChannelRouter::channel();
    let background = Background::new(Arc::new(router));
    let content = ContentScript::new(orchestrator, Arc::new(ClipboardPage));
    if content.initialize().is_some() {
        tracing::info!("auto-translate is on; the clipboard host exposes no fields to watch");
    }

    // Hotkey presses arrive on a plain thread; the background handler only
    // forwards, so it runs there too.
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<&'static str>();
    win_hotkey::spawn_hotkey_listener(hotkey_tx);
    thread::spawn(move || {
        while let Ok(command) = hotkey_rx.recv() {
            background.handle_command(command);
        }
        tracing::info!("hotkey listener stopped");
    });

    content.run(rx).await;
    Ok(())
}
