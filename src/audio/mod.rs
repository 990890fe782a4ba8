/// Microphone capture and WAV file I/O
pub mod capture;

pub use capture::{AudioCapture, Recorder};
