use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// HuggingFace filename for a model size name ("base" -> "ggml-base.bin")
fn model_filename(model_name: &str) -> String {
    format!("ggml-{model_name}.bin")
}

/// Download the model if it is not already on disk.
///
/// Returns true if a download happened, false if the file already existed.
///
/// # Errors
/// Returns error on network failure or if the file cannot be written.
pub fn ensure_model_downloaded(model_name: &str, model_path: &Path) -> Result<bool> {
    if model_path.exists() {
        tracing::debug!(path = %model_path.display(), "model already present");
        return Ok(false);
    }

    tracing::info!(
        model = model_name,
        path = %model_path.display(),
        "model not found, downloading"
    );

    download_model(model_name, model_path)?;

    Ok(true)
}

fn download_model(model_name: &str, model_path: &Path) -> Result<()> {
    let url = format!("{}/{}", MODEL_BASE_URL, model_filename(model_name));

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent).context("failed to create model directory")?;
    }

    // Download to a temp file first so an interrupted download never leaves
    // a truncated model behind
    let temp_path = model_path.with_extension("tmp");

    let response = reqwest::blocking::get(&url)
        .with_context(|| format!("failed to download model from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("download failed with status {}: {}", response.status(), url);
    }

    let bytes = response.bytes().context("failed to read response bytes")?;

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create temp file at {}", temp_path.display()))?;
    file.write_all(&bytes)
        .context("failed to write model to temp file")?;
    drop(file);

    fs::rename(&temp_path, model_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            model_path.display()
        )
    })?;

    tracing::info!(
        path = %model_path.display(),
        size = bytes.len(),
        "model downloaded"
    );

    Ok(())
}
