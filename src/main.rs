use anyhow::{Context, Result};
use global_hotkey::GlobalHotKeyEvent;
use std::sync::Arc;

use dictation_hotkey::app::DictationApp;
use dictation_hotkey::audio::AudioCapture;
use dictation_hotkey::config::Config;
use dictation_hotkey::input::hotkey::HotkeyListener;
use dictation_hotkey::transcription::{ensure_model_downloaded, EngineHandle};
use dictation_hotkey::tray::{TrayCommand, TrayManager};
use dictation_hotkey::{logging, recordings};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init(&config.logging)?;
    tracing::info!("dictation-hotkey starting");

    if let Err(e) = recordings::cleanup_old_recordings(&config.recordings) {
        tracing::warn!(error = %e, "recordings cleanup failed");
    }

    let model_path = Config::expand_path(&config.model.path)?;
    ensure_model_downloaded(&config.model.name, &model_path)?;

    let engine = Arc::new(EngineHandle::new(model_path, config.model.clone()));
    if config.model.preload {
        engine.get().context("failed to load whisper model")?;
    }

    let capture = AudioCapture::new(&config.audio)?;

    let mut listener = HotkeyListener::new(&config.hotkey)?;
    println!(
        "Hotkey registered: {:?} + {}",
        config.hotkey.modifiers, config.hotkey.key
    );

    let mut app = DictationApp::new(capture, engine, config);
    let mut tray = TrayManager::new(app.state_handle())?;

    tracing::info!("event loop starting");
    println!("Dictation Hotkey is running. Press the hotkey to dictate.");
    println!("Press Ctrl+C to exit.\n");

    let receiver = GlobalHotKeyEvent::receiver();
    loop {
        // Poll for hotkey events
        if let Ok(event) = receiver.try_recv() {
            if listener.accept_event(&event) {
                app.on_toggle();
            }
        }

        // Poll for tray menu clicks
        if let Some(command) = TrayManager::poll_events() {
            match command {
                TrayCommand::OpenConfigFile => open_config_file(),
                TrayCommand::Quit => {
                    tracing::info!("quit requested from tray");
                    break;
                }
            }
        }

        if let Err(e) = tray.update_icon_if_needed() {
            tracing::warn!(error = %e, "tray update failed");
        }

        // Check for shutdown signal
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            () = tokio::time::sleep(tokio::time::Duration::from_millis(10)) => {
                // Poll interval (10ms to avoid busy-waiting)
            }
        }
    }

    Ok(())
}

/// Open the config file with the platform's default handler.
fn open_config_file() {
    let path = match Config::config_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "failed to resolve config path");
            return;
        }
    };

    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    if let Err(e) = std::process::Command::new(opener).arg(&path).spawn() {
        tracing::warn!(error = %e, "failed to open config file");
    }
}
