//! Dictation Hotkey - press a global hotkey, speak, press again, and the
//! transcription is pasted at your cursor.
//!
//! This library exports core modules for testing and potential future reuse.

/// State machine driving the record/transcribe/paste cycle
pub mod app;
/// Audio capture and WAV handling
pub mod audio;
/// Configuration management
pub mod config;
/// Input handling (hotkeys, clipboard, paste keystroke)
pub mod input;
/// Structured logging setup
pub mod logging;
/// Recording retention and cleanup
pub mod recordings;
/// Whisper transcription engine and model download
pub mod transcription;
/// Tray icon with state feedback
pub mod tray;
