/// Global hotkey registration and debounce
pub mod hotkey;
/// Clipboard copy and paste-keystroke injection
pub mod insert;
