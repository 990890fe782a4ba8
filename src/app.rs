use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioCapture, Recorder};
use crate::config::Config;
use crate::input::insert;
use crate::recordings;
use crate::transcription::EngineHandle;

/// Dictation state, linear by construction:
/// Idle -> Recording -> Processing -> Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Idle,
    Recording,
    Processing,
}

/// Why a stop toggle did not lead to transcription
#[derive(Debug, PartialEq, Eq)]
enum StopDecision {
    Proceed,
    NoAudio,
    TooShort(Duration),
}

/// Gate applied when recording stops: discard empty captures and
/// recordings shorter than the configured minimum (accidental
/// double-press protection).
#[allow(clippy::cast_precision_loss)]
fn stop_decision(sample_count: usize, sample_rate: u32, min_duration: Duration) -> StopDecision {
    if sample_count == 0 || sample_rate == 0 {
        return StopDecision::NoAudio;
    }
    let duration =
        Duration::from_secs_f64(sample_count as f64 / f64::from(sample_rate));
    if duration < min_duration {
        StopDecision::TooShort(duration)
    } else {
        StopDecision::Proceed
    }
}

/// Post-recording processing seam, mockable in state-machine tests.
#[cfg_attr(test, mockall::automock)]
pub trait Processor: Send + Sync {
    /// Consume one finished recording.
    ///
    /// # Errors
    /// Returns error if saving, transcription or the clipboard step fails.
    fn process(&self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Production pipeline: save the recording, transcribe the saved file,
/// copy the text to the clipboard and paste it at the cursor.
struct WhisperProcessor {
    engine: Arc<EngineHandle>,
    keep_recording: bool,
}

impl WhisperProcessor {
    fn transcribe_and_paste(&self, wav_path: &Path) -> Result<()> {
        // The engine consumes the saved file, so what is on disk is exactly
        // what was transcribed
        let text = self.engine.get()?.transcribe_wav(wav_path)?;
        if text.is_empty() {
            info!("transcription empty (no speech detected)");
        } else {
            info!(text_preview = %insert::text_preview(&text), "transcription result");
        }

        insert::copy_and_paste(&text)?;
        Ok(())
    }
}

impl Processor for WhisperProcessor {
    fn process(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        let wav_path: PathBuf = if self.keep_recording {
            recordings::new_recording_path()?
        } else {
            std::env::temp_dir().join("dictation_last_recording.wav")
        };

        AudioCapture::save_wav(samples, sample_rate, &wav_path)?;
        info!(path = %wav_path.display(), "saved recording");

        let result = self.transcribe_and_paste(&wav_path);

        // Temp recordings are removed on failure too
        if !self.keep_recording {
            let _ = std::fs::remove_file(&wav_path);
        }

        result
    }
}

/// Orchestrates the hotkey-toggled record/transcribe/paste cycle.
///
/// Audio capture stays on the main thread (the cpal stream is not Send);
/// each accepted stop hands the drained samples to a background pipeline
/// thread, which resets the shared state to Idle when done. At most one
/// pipeline runs at a time: toggles during Processing are ignored.
pub struct DictationApp<R: Recorder> {
    state: Arc<Mutex<AppState>>,
    capture: R,
    processor: Arc<dyn Processor>,
    config: Config,
}

impl DictationApp<AudioCapture> {
    pub fn new(capture: AudioCapture, engine: Arc<EngineHandle>, config: Config) -> Self {
        let processor = Arc::new(WhisperProcessor {
            engine,
            keep_recording: config.recordings.enabled,
        });
        Self::with_processor(capture, processor, config)
    }
}

impl<R: Recorder> DictationApp<R> {
    fn with_processor(capture: R, processor: Arc<dyn Processor>, config: Config) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::Idle)),
            capture,
            processor,
            config,
        }
    }

    /// Shared state handle, used by the tray to reflect the current state.
    pub fn state_handle(&self) -> Arc<Mutex<AppState>> {
        Arc::clone(&self.state)
    }

    fn current_state(&self) -> Result<AppState> {
        Ok(*self
            .state
            .lock()
            .map_err(|e| anyhow!("state lock poisoned: {}", e))?)
    }

    fn set_state(&self, new: AppState) -> Result<()> {
        *self
            .state
            .lock()
            .map_err(|e| anyhow!("state lock poisoned: {}", e))? = new;
        Ok(())
    }

    /// Handle an accepted hotkey toggle.
    ///
    /// Errors from the audio layer are logged and leave the app idle;
    /// they are not propagated so the event loop keeps running.
    pub fn on_toggle(&mut self) {
        let result = match self.current_state() {
            Ok(AppState::Idle) => self.start_recording(),
            Ok(AppState::Recording) => self.stop_and_process(),
            Ok(AppState::Processing) => {
                debug!("hotkey pressed while processing (ignored)");
                Ok(())
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(error = %e, "toggle failed, returning to idle");
            let _ = self.set_state(AppState::Idle);
        }
    }

    fn start_recording(&mut self) -> Result<()> {
        info!("hotkey pressed: Idle -> Recording");
        self.capture.start_recording()?;
        self.set_state(AppState::Recording)
    }

    fn stop_and_process(&mut self) -> Result<()> {
        let samples = self.capture.stop_recording()?;

        let min_duration = Duration::from_millis(self.config.audio.min_duration_ms);
        match stop_decision(samples.len(), self.config.audio.sample_rate, min_duration) {
            StopDecision::NoAudio => {
                warn!("recording stopped with no audio captured");
                return self.set_state(AppState::Idle);
            }
            StopDecision::TooShort(duration) => {
                warn!(
                    duration_ms = duration.as_millis(),
                    min_ms = min_duration.as_millis(),
                    "recording too short, discarded"
                );
                return self.set_state(AppState::Idle);
            }
            StopDecision::Proceed => {}
        }

        info!(
            samples = samples.len(),
            "hotkey pressed: Recording -> Processing"
        );
        self.set_state(AppState::Processing)?;

        let processor = Arc::clone(&self.processor);
        let state = Arc::clone(&self.state);
        let sample_rate = self.config.audio.sample_rate;

        std::thread::spawn(move || {
            if let Err(e) = processor.process(&samples, sample_rate) {
                error!(error = %e, "transcription pipeline failed");
            }
            // Back to idle no matter what happened above
            match state.lock() {
                Ok(mut s) => *s = AppState::Idle,
                Err(e) => error!("state lock poisoned: {}", e),
            }
            info!("processing complete: Processing -> Idle");
        });

        Ok(())
    }
}
