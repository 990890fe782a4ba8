use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from the clipboard/paste path
#[derive(Debug, Error)]
pub enum InsertError {
    /// The platform clipboard tool could not be spawned
    #[error("failed to spawn {tool}: {source}")]
    ClipboardSpawn {
        /// Tool name (pbcopy, wl-copy, xclip)
        tool: &'static str,
        /// Underlying error
        source: std::io::Error,
    },

    /// The clipboard tool exited with a failure status
    #[error("{tool} exited with status {status}")]
    ClipboardStatus {
        /// Tool name
        tool: &'static str,
        /// Exit status
        status: std::process::ExitStatus,
    },

    /// Writing to the clipboard tool's stdin failed
    #[error("failed to write to clipboard tool stdin")]
    ClipboardWrite(#[from] std::io::Error),

    /// Synthetic keystroke injection failed
    #[error("failed to inject paste keystroke: {0}")]
    Keystroke(String),
}

/// Generate a log-safe preview of text, truncated at a UTF-8 char boundary.
#[must_use]
pub fn text_preview(text: &str) -> String {
    if text.len() > 50 {
        let mut end = 47.min(text.len());
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return "...".to_owned();
        }
        format!("{}...", &text[..end])
    } else {
        text.to_owned()
    }
}

/// Platform clipboard tool and its arguments.
fn clipboard_tool() -> (&'static str, Vec<&'static str>) {
    #[cfg(target_os = "macos")]
    {
        ("pbcopy", vec![])
    }
    #[cfg(not(target_os = "macos"))]
    {
        let session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();
        if session_type == "wayland" {
            ("wl-copy", vec![])
        } else {
            ("xclip", vec!["-selection", "clipboard"])
        }
    }
}

/// Set the system clipboard by piping text to the platform tool.
pub fn copy_to_clipboard(text: &str) -> Result<(), InsertError> {
    let (tool, args) = clipboard_tool();

    let mut child = Command::new(tool)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| InsertError::ClipboardSpawn { tool, source })?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(InsertError::ClipboardStatus { tool, status });
    }

    debug!(tool = tool, text_len = text.len(), "clipboard set");
    Ok(())
}

/// Inject the platform paste keystroke (Cmd+V on macOS, Ctrl+V elsewhere).
pub fn send_paste_keystroke() -> Result<(), InsertError> {
    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| InsertError::Keystroke(e.to_string()))?;

    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| InsertError::Keystroke(e.to_string()))?;
    enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| InsertError::Keystroke(e.to_string()))?;
    enigo
        .key(modifier, Direction::Release)
        .map_err(|e| InsertError::Keystroke(e.to_string()))?;

    // Give the focused app a moment to consume the paste before the
    // clipboard is touched again
    std::thread::sleep(Duration::from_millis(50));

    Ok(())
}

/// Copy text to the clipboard, then paste it into the focused window.
///
/// The clipboard is always set first; a paste failure is logged as a
/// warning and does not propagate, so the user keeps the manual
/// paste-by-hand fallback. Empty text is copied but never pasted.
///
/// # Errors
/// Returns error only if the clipboard itself could not be set.
pub fn copy_and_paste(text: &str) -> Result<(), InsertError> {
    copy_and_paste_with(text, copy_to_clipboard, send_paste_keystroke)
}

// The copy and paste steps are parameters so the failure ordering is
// testable without a desktop session
fn copy_and_paste_with(
    text: &str,
    copy: impl FnOnce(&str) -> Result<(), InsertError>,
    paste: impl FnOnce() -> Result<(), InsertError>,
) -> Result<(), InsertError> {
    copy(text)?;
    info!(
        text_len = text.len(),
        text_preview = %text_preview(text),
        "copied to clipboard"
    );

    if text.is_empty() {
        debug!("empty transcription, skipping paste");
        return Ok(());
    }

    match paste() {
        Ok(()) => info!("paste keystroke sent to focused window"),
        Err(e) => warn!(error = %e, "paste failed (text remains in clipboard)"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_preview_short() {
        assert_eq!(text_preview("hello"), "hello");
        assert_eq!(text_preview(""), "");
    }

    #[test]
    fn test_text_preview_exactly_50_chars() {
        let text = "a".repeat(50);
        assert_eq!(text_preview(&text), text);
    }

    #[test]
    fn test_text_preview_truncates_long_text() {
        let text = "a".repeat(100);
        let preview = text_preview(&text);
        assert!(preview.len() <= 50);
        assert!(preview.ends_with("..."));
        assert!(preview.starts_with(&text[..preview.len() - 3]));
    }

    #[test]
    fn test_text_preview_respects_char_boundaries() {
        let text = "ż".repeat(40); // 2 bytes per char
        let preview = text_preview(&text);
        assert!(preview.ends_with("..."));
        // Must not split a multi-byte char
        assert!(preview[..preview.len() - 3]
            .chars()
            .all(|c| c == 'ż'));
    }

    #[test]
    fn test_paste_failure_still_succeeds_after_copy() {
        let copied = std::cell::Cell::new(false);
        let result = copy_and_paste_with(
            "hello world",
            |_| {
                copied.set(true);
                Ok(())
            },
            || Err(InsertError::Keystroke("permission denied".to_owned())),
        );
        // The clipboard was set first, so a failed paste is not an error
        assert!(result.is_ok());
        assert!(copied.get());
    }

    #[test]
    fn test_copy_failure_propagates_and_skips_paste() {
        let pasted = std::cell::Cell::new(false);
        let result = copy_and_paste_with(
            "hello world",
            |_| {
                Err(InsertError::ClipboardWrite(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                )))
            },
            || {
                pasted.set(true);
                Ok(())
            },
        );
        assert!(result.is_err());
        assert!(!pasted.get());
    }

    #[test]
    fn test_empty_text_copied_but_never_pasted() {
        let copied = std::cell::Cell::new(false);
        let pasted = std::cell::Cell::new(false);
        let result = copy_and_paste_with(
            "",
            |_| {
                copied.set(true);
                Ok(())
            },
            || {
                pasted.set(true);
                Ok(())
            },
        );
        assert!(result.is_ok());
        assert!(copied.get());
        assert!(!pasted.get());
    }

    #[test]
    fn test_clipboard_tool_selection() {
        let (tool, _) = clipboard_tool();
        #[cfg(target_os = "macos")]
        assert_eq!(tool, "pbcopy");
        #[cfg(not(target_os = "macos"))]
        assert!(tool == "wl-copy" || tool == "xclip");
    }

    #[test]
    #[ignore = "requires a clipboard tool and a running session"]
    fn test_copy_to_clipboard_roundtrip() {
        assert!(copy_to_clipboard("dictation test").is_ok());
    }

    #[test]
    #[ignore = "requires a display server and injects a real keystroke"]
    fn test_copy_and_paste_nonempty() {
        assert!(copy_and_paste("hello from dictation").is_ok());
    }
}
