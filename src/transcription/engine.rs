use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::AudioCapture;
use crate::config::ModelConfig;

/// Trait seam for transcription, mockable in state-machine tests.
#[cfg_attr(test, mockall::automock)]
pub trait Transcriber: Send + Sync {
    /// Transcribe 16 kHz mono f32 samples to text.
    ///
    /// # Errors
    /// Returns error if Whisper inference fails.
    fn transcribe(&self, audio: &[f32]) -> Result<String, TranscriptionError>;
}

/// Errors that can occur during transcription
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Failed to load Whisper model
    #[error("failed to load whisper model from {path}: {source}")]
    ModelLoad {
        /// Path to model file
        path: String,
        /// Underlying error
        source: anyhow::Error,
    },

    /// Failed to create Whisper inference state
    #[error("failed to create whisper state")]
    StateCreation,

    /// Could not read the recorded WAV file
    #[error("failed to read recording: {0}")]
    WavRead(#[from] anyhow::Error),

    /// Transcription inference failed
    #[error("whisper inference failed: {0}")]
    Inference(String),
}

/// Whisper transcription engine
pub struct TranscriptionEngine {
    ctx: Arc<Mutex<WhisperContext>>,
    threads: i32,
    beam_size: i32,
    language: Option<String>,
}

impl TranscriptionEngine {
    /// Sampling strategy derived from beam size (pure, testable)
    const fn sampling_strategy(beam_size: i32) -> SamplingStrategy {
        if beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy { best_of: 1 }
        }
    }

    /// Load the model described by `config`, with `model_path` already
    /// expanded.
    ///
    /// # Errors
    /// Returns error if the model file is missing/invalid or the decoding
    /// parameters are out of range.
    pub fn new(model_path: &Path, config: &ModelConfig) -> Result<Self, TranscriptionError> {
        let model_load_err = |source: anyhow::Error| TranscriptionError::ModelLoad {
            path: model_path.display().to_string(),
            source,
        };

        if config.threads == 0 {
            return Err(model_load_err(anyhow::anyhow!("threads must be > 0")));
        }
        if config.beam_size == 0 {
            return Err(model_load_err(anyhow::anyhow!("beam_size must be > 0")));
        }

        let threads = i32::try_from(config.threads)
            .map_err(|_| model_load_err(anyhow::anyhow!("threads value too large")))?;
        let beam_size = i32::try_from(config.beam_size)
            .map_err(|_| model_load_err(anyhow::anyhow!("beam_size value too large")))?;

        tracing::info!(
            path = %model_path.display(),
            threads = config.threads,
            beam_size = config.beam_size,
            language = ?config.language,
            "loading whisper model"
        );

        let path_str = model_path
            .to_str()
            .ok_or_else(|| model_load_err(anyhow::anyhow!("model path contains invalid UTF-8")))?;

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, params)
            .map_err(|e| model_load_err(anyhow::anyhow!("{e:?}")))?;

        tracing::info!("whisper model loaded");

        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
            threads,
            beam_size,
            language: config.language.clone(),
        })
    }

    /// Transcribe a saved recording by path.
    ///
    /// # Errors
    /// Returns error if the WAV cannot be read or inference fails.
    pub fn transcribe_wav(&self, wav_path: &Path) -> Result<String, TranscriptionError> {
        let samples = AudioCapture::load_wav(wav_path)?;
        self.transcribe_samples(&samples)
    }

    fn transcribe_samples(&self, audio: &[f32]) -> Result<String, TranscriptionError> {
        tracing::debug!(samples = audio.len(), "starting transcription");

        let mut state = self
            .ctx
            .lock()
            .map_err(|e| TranscriptionError::Inference(format!("mutex poisoned: {e}")))?
            .create_state()
            .map_err(|_| TranscriptionError::StateCreation)?;

        let strategy = Self::sampling_strategy(self.beam_size);
        let mut params = FullParams::new(strategy);
        params.set_n_threads(self.threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(self.language.as_deref());
        params.set_translate(false);

        let start = std::time::Instant::now();
        state
            .full(params, audio)
            .map_err(|e| TranscriptionError::Inference(format!("{e:?}")))?;
        let inference_duration = start.elapsed();

        let mut result = String::new();
        for segment in state.as_iter() {
            result.push_str(&segment.to_string());
        }
        let result = result.trim().to_owned();

        tracing::info!(
            segments = state.full_n_segments(),
            text_len = result.len(),
            inference_ms = inference_duration.as_millis(),
            "transcription completed"
        );

        Ok(result)
    }
}

impl Transcriber for TranscriptionEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, TranscriptionError> {
        self.transcribe_samples(audio)
    }
}

/// Shared handle that defers model loading until first use.
///
/// With `preload` enabled the caller loads the model at startup through
/// [`EngineHandle::get`]; otherwise the first transcription pays the load
/// cost. A failed load is not cached, so a later call retries.
pub struct EngineHandle {
    engine: Mutex<Option<Arc<TranscriptionEngine>>>,
    model_path: PathBuf,
    config: ModelConfig,
}

impl EngineHandle {
    #[must_use]
    pub fn new(model_path: PathBuf, config: ModelConfig) -> Self {
        Self {
            engine: Mutex::new(None),
            model_path,
            config,
        }
    }

    /// Get the engine, loading the model on first call.
    ///
    /// # Errors
    /// Returns error if the model cannot be loaded.
    pub fn get(&self) -> Result<Arc<TranscriptionEngine>, TranscriptionError> {
        let mut guard = self
            .engine
            .lock()
            .map_err(|e| TranscriptionError::Inference(format!("engine lock poisoned: {e}")))?;

        if let Some(engine) = guard.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(TranscriptionEngine::new(&self.model_path, &self.config)?);
        *guard = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

// SAFETY: the WhisperContext is only reached through the Arc<Mutex<_>>,
// so access is always exclusive; whisper-rs contexts are safe to use
// across threads under external synchronization.
#[allow(unsafe_code)]
unsafe impl Send for TranscriptionEngine {}
#[allow(unsafe_code)]
unsafe impl Sync for TranscriptionEngine {}
