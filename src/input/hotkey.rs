use anyhow::{anyhow, Context, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::HotkeyConfig;

/// Returns true if enough time has passed since the last accepted press.
///
/// A single physical press can surface as more than one event when focus
/// shifts between apps, so presses inside the window are dropped.
fn debounce_elapsed(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.duration_since(last) >= window,
    }
}

/// Global hotkey listener with press debouncing.
///
/// Emits one accepted toggle per physical press; release events and presses
/// inside the debounce window are ignored.
pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    debounce: Duration,
    last_accepted: Option<Instant>,
}

impl HotkeyListener {
    /// Create and register the global hotkey from config
    pub fn new(config: &HotkeyConfig) -> Result<Self> {
        let manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;

        let modifiers = parse_modifiers(&config.modifiers)?;
        let code = parse_key(&config.key)?;

        let hotkey = HotKey::new(Some(modifiers), code);
        manager
            .register(hotkey)
            .context("failed to register hotkey")?;

        info!("registered hotkey: {:?} + {}", config.modifiers, config.key);

        Ok(Self {
            manager,
            hotkey,
            debounce: Duration::from_millis(config.debounce_ms),
            last_accepted: None,
        })
    }

    /// Returns true when the event is an accepted toggle press.
    pub fn accept_event(&mut self, event: &GlobalHotKeyEvent) -> bool {
        if event.id != self.hotkey.id() {
            return false;
        }
        match event.state {
            global_hotkey::HotKeyState::Pressed => {
                let now = Instant::now();
                if debounce_elapsed(self.last_accepted, now, self.debounce) {
                    self.last_accepted = Some(now);
                    true
                } else {
                    debug!("hotkey press inside debounce window (ignored)");
                    false
                }
            }
            // Press-to-toggle tool: releases carry no meaning
            global_hotkey::HotKeyState::Released => false,
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        if let Err(e) = self.manager.unregister(self.hotkey) {
            tracing::error!("failed to unregister hotkey: {}", e);
        }
    }
}

fn parse_modifiers(modifiers: &[String]) -> Result<Modifiers> {
    let mut result = Modifiers::empty();
    for modifier in modifiers {
        match modifier.as_str() {
            "Control" | "Ctrl" => result |= Modifiers::CONTROL,
            "Option" | "Alt" => result |= Modifiers::ALT,
            "Command" | "Super" => result |= Modifiers::SUPER,
            "Shift" => result |= Modifiers::SHIFT,
            _ => return Err(anyhow!("unknown modifier: {}", modifier)),
        }
    }
    Ok(result)
}

fn parse_key(key: &str) -> Result<Code> {
    match key {
        "A" => Ok(Code::KeyA),
        "B" => Ok(Code::KeyB),
        "C" => Ok(Code::KeyC),
        "D" => Ok(Code::KeyD),
        "E" => Ok(Code::KeyE),
        "F" => Ok(Code::KeyF),
        "G" => Ok(Code::KeyG),
        "H" => Ok(Code::KeyH),
        "I" => Ok(Code::KeyI),
        "J" => Ok(Code::KeyJ),
        "K" => Ok(Code::KeyK),
        "L" => Ok(Code::KeyL),
        "M" => Ok(Code::KeyM),
        "N" => Ok(Code::KeyN),
        "O" => Ok(Code::KeyO),
        "P" => Ok(Code::KeyP),
        "Q" => Ok(Code::KeyQ),
        "R" => Ok(Code::KeyR),
        "S" => Ok(Code::KeyS),
        "T" => Ok(Code::KeyT),
        "U" => Ok(Code::KeyU),
        "V" => Ok(Code::KeyV),
        "W" => Ok(Code::KeyW),
        "X" => Ok(Code::KeyX),
        "Y" => Ok(Code::KeyY),
        "Z" => Ok(Code::KeyZ),
        "Space" => Ok(Code::Space),
        _ => Err(anyhow!("unsupported key: {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_first_press_accepted() {
        let now = Instant::now();
        assert!(debounce_elapsed(None, now, Duration::from_millis(600)));
    }

    #[test]
    fn test_debounce_press_inside_window_rejected() {
        let start = Instant::now();
        let inside = start + Duration::from_millis(300);
        assert!(!debounce_elapsed(
            Some(start),
            inside,
            Duration::from_millis(600)
        ));
    }

    #[test]
    fn test_debounce_press_after_window_accepted() {
        let start = Instant::now();
        let after = start + Duration::from_millis(601);
        assert!(debounce_elapsed(
            Some(start),
            after,
            Duration::from_millis(600)
        ));
    }

    #[test]
    fn test_debounce_exact_boundary_accepted() {
        let start = Instant::now();
        let at = start + Duration::from_millis(600);
        assert!(debounce_elapsed(
            Some(start),
            at,
            Duration::from_millis(600)
        ));
    }

    #[test]
    fn test_parse_modifiers_known() {
        let mods = parse_modifiers(&["Control".to_owned(), "Shift".to_owned()]).unwrap();
        assert!(mods.contains(Modifiers::CONTROL));
        assert!(mods.contains(Modifiers::SHIFT));
        assert!(!mods.contains(Modifiers::ALT));
    }

    #[test]
    fn test_parse_modifiers_aliases() {
        let mods = parse_modifiers(&["Ctrl".to_owned(), "Alt".to_owned(), "Super".to_owned()])
            .unwrap();
        assert!(mods.contains(Modifiers::CONTROL));
        assert!(mods.contains(Modifiers::ALT));
        assert!(mods.contains(Modifiers::SUPER));
    }

    #[test]
    fn test_parse_modifiers_unknown() {
        let result = parse_modifiers(&["Hyper".to_owned()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_key_letters_and_space() {
        assert!(matches!(parse_key("M"), Ok(Code::KeyM)));
        assert!(matches!(parse_key("Z"), Ok(Code::KeyZ)));
        assert!(matches!(parse_key("Space"), Ok(Code::Space)));
    }

    #[test]
    fn test_parse_key_unsupported() {
        assert!(parse_key("F13").is_err());
        assert!(parse_key("m").is_err());
        assert!(parse_key("").is_err());
    }

    #[test]
    #[ignore = "requires a display server to register global hotkeys"]
    fn test_listener_registration() {
        let config = HotkeyConfig::default();
        let listener = HotkeyListener::new(&config);
        assert!(listener.is_ok());
    }
}
