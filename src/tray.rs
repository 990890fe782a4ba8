use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tray_icon::menu::{Menu, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIconBuilder};

use crate::app::AppState;

const ICON_SIZE: u32 = 32;

/// Commands surfaced by tray menu clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    OpenConfigFile,
    Quit,
}

/// Tray icon reflecting the dictation state, with a minimal menu.
pub struct TrayManager {
    tray: tray_icon::TrayIcon,
    state: Arc<Mutex<AppState>>,
    current_icon_state: AppState,
    cached_icons: HashMap<AppState, Icon>,
}

impl TrayManager {
    pub fn new(state: Arc<Mutex<AppState>>) -> Result<Self> {
        let mut cached_icons = HashMap::new();
        for s in [AppState::Idle, AppState::Recording, AppState::Processing] {
            cached_icons.insert(s, state_icon(s)?);
        }

        let tray = Self::build_tray(AppState::Idle, &cached_icons)?;

        Ok(Self {
            tray,
            state,
            current_icon_state: AppState::Idle,
            cached_icons,
        })
    }

    fn build_tray(
        app_state: AppState,
        cached_icons: &HashMap<AppState, Icon>,
    ) -> Result<tray_icon::TrayIcon> {
        let icon = cached_icons
            .get(&app_state)
            .with_context(|| format!("icon for state {app_state:?} not in cache"))?
            .clone();
        let menu = Self::build_menu(app_state)?;

        TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Dictation Hotkey")
            .with_icon(icon)
            .build()
            .context("failed to build tray icon")
    }

    fn status_text(app_state: AppState) -> &'static str {
        match app_state {
            AppState::Idle => "Dictation - Ready",
            AppState::Recording => "Recording...",
            AppState::Processing => "Transcribing...",
        }
    }

    fn build_menu(app_state: AppState) -> Result<Menu> {
        let menu = Menu::new();

        // Non-clickable status line
        let status = MenuItem::new(Self::status_text(app_state), false, None);
        menu.append(&status)
            .context("failed to append status item")?;
        menu.append(&PredefinedMenuItem::separator())
            .context("failed to append separator")?;

        let open_config = MenuItem::with_id("open-config", "Open Config File", true, None);
        menu.append(&open_config)
            .context("failed to append open config item")?;

        let quit = MenuItem::with_id("quit", "Quit", true, None);
        menu.append(&quit).context("failed to append quit item")?;

        Ok(menu)
    }

    /// Rebuild tray with a new icon and status line when state changed.
    ///
    /// A full rebuild works around `set_icon()` not refreshing reliably
    /// on macOS.
    pub fn update_icon_if_needed(&mut self) -> Result<()> {
        let new_state = *self
            .state
            .lock()
            .map_err(|e| anyhow!("state lock poisoned: {}", e))?;
        if new_state != self.current_icon_state {
            tracing::debug!(
                "tray state change: {:?} -> {:?}",
                self.current_icon_state,
                new_state
            );
            self.tray = Self::build_tray(new_state, &self.cached_icons)?;
            self.current_icon_state = new_state;
        }
        Ok(())
    }

    /// Drain one pending tray menu event, if any.
    pub fn poll_events() -> Option<TrayCommand> {
        use tray_icon::menu::MenuEvent;

        if let Ok(event) = MenuEvent::receiver().try_recv() {
            return Self::parse_menu_event(event.id.0.as_str());
        }

        None
    }

    fn parse_menu_event(id: &str) -> Option<TrayCommand> {
        match id {
            "open-config" => Some(TrayCommand::OpenConfigFile),
            "quit" => Some(TrayCommand::Quit),
            _ => None,
        }
    }
}

fn state_color(state: AppState) -> [u8; 3] {
    match state {
        AppState::Idle => [120, 120, 120],
        AppState::Recording => [220, 50, 50],
        AppState::Processing => [50, 180, 80],
    }
}

/// Render a filled circle icon for the state (no bundled image assets).
fn state_icon(state: AppState) -> Result<Icon> {
    let rgba = render_circle(ICON_SIZE, state_color(state));
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).context("failed to create icon from RGBA data")
}

#[allow(clippy::cast_precision_loss)]
fn render_circle(size: u32, color: [u8; 3]) -> Vec<u8> {
    let mut image = image::RgbaImage::new(size, size);
    let center = (size as f32 - 1.0) / 2.0;
    let radius = center - 2.0;

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let dist = (dx * dx + dy * dy).sqrt();
        *pixel = if dist <= radius {
            image::Rgba([color[0], color[1], color[2], 255])
        } else if dist <= radius + 1.0 {
            // one-pixel soft edge
            let alpha = ((radius + 1.0 - dist) * 255.0).clamp(0.0, 255.0) as u8;
            image::Rgba([color[0], color[1], color[2], alpha])
        } else {
            image::Rgba([0, 0, 0, 0])
        };
    }

    image.into_raw()
}
