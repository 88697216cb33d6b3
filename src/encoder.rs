//! Transcoding raw samples to a compressed container with an external encoder.
//!
//! Each call writes the samples to a temporary WAV file, runs the encoder
//! process on it and reads back the compressed file. Both files are removed
//! when the call returns, whether it succeeded or not.
//!
//! The encoder is invoked as
//!
//! ```text
//! <program> <program_args..> -hide_banner -loglevel error -i <in.wav> -c:a <codec> -b:a <bitrate> -y <out>
//! ```
//!
//! which matches ffmpeg. Any binary that accepts the same arguments can be
//! substituted; the output path is always the last argument.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use derive_builder::Builder;
use tempfile::TempPath;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{Result, TtsError};
use crate::SynthesisResult;

/// Settings for the external encoder.
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct EncoderConfig {
    /// Encoder executable, looked up on PATH when not absolute.
    pub program: PathBuf,
    /// Arguments placed before the encoder arguments (e.g. a script path
    /// when `program` is an interpreter).
    pub program_args: Vec<String>,
    /// Audio codec passed to `-c:a`.
    pub codec: String,
    /// Target bitrate passed to `-b:a`.
    pub bitrate: String,
    /// File extension of the compressed container.
    pub extension: String,
    /// Content type served for the compressed container.
    pub content_type: String,
    /// Directory for per-request temporary files. Created on demand.
    pub temp_dir: PathBuf,
    /// Upper bound on one encoder run. The process is killed when it elapses.
    pub timeout: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            program_args: Vec::new(),
            codec: "libopus".to_string(),
            bitrate: "24k".to_string(),
            extension: "ogg".to_string(),
            content_type: "audio/ogg".to_string(),
            temp_dir: std::env::temp_dir().join("tts_audio"),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Compressed audio ready to be served.
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

/// Runs the external encoder on synthesized audio.
#[derive(Debug, Clone)]
pub struct EncoderBridge {
    config: EncoderConfig,
}

impl EncoderBridge {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode `audio` into the configured container.
    ///
    /// `request_id` only prefixes the temporary file names so concurrent
    /// requests are easy to tell apart on disk.
    pub async fn encode(&self, audio: SynthesisResult, request_id: Uuid) -> Result<EncodedAudio> {
        tokio::fs::create_dir_all(&self.config.temp_dir)
            .await
            .map_err(|e| {
                TtsError::Internal(format!(
                    "failed to create temp dir {}: {e}",
                    self.config.temp_dir.display()
                ))
            })?;

        let wav_path = self.temp_path(request_id, "wav")?;
        let out_path = self.temp_path(request_id, &self.config.extension)?;

        let wav_target = wav_path.to_path_buf();
        let sample_count = audio.samples.len();
        tokio::task::spawn_blocking(move || audio.write_wav(&wav_target))
            .await
            .map_err(|e| TtsError::Internal(format!("WAV writer task failed: {e}")))?
            .map_err(|e| TtsError::Internal(format!("failed to write WAV file: {e}")))?;
        log::debug!("WAV file saved: {} ({sample_count} samples)", wav_path.display());

        self.run_encoder(&wav_path, &out_path).await?;

        let bytes = match tokio::fs::read(&out_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(TtsError::Internal(format!(
                    "failed to read encoder output: {e}"
                )))
            }
        };
        if bytes.is_empty() {
            return Err(TtsError::Encoding("encoder produced no output".to_string()));
        }

        release(wav_path);
        release(out_path);

        Ok(EncodedAudio {
            bytes,
            content_type: self.config.content_type.clone(),
            extension: self.config.extension.clone(),
        })
    }

    fn temp_path(&self, request_id: Uuid, extension: &str) -> Result<TempPath> {
        tempfile::Builder::new()
            .prefix(&format!("{request_id}-"))
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.config.temp_dir)
            .map(|file| file.into_temp_path())
            .map_err(|e| TtsError::Internal(format!("failed to create temp file: {e}")))
    }

    async fn run_encoder(&self, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.program_args)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-c:a", self.config.codec.as_str(), "-b:a", self.config.bitrate.as_str(), "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let result = tokio::time::timeout(self.config.timeout, command.output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TtsError::Encoding(format!(
                    "encoder '{}' not found",
                    self.config.program.display()
                )))
            }
            Ok(Err(e)) => {
                return Err(TtsError::Encoding(format!("failed to run encoder: {e}")));
            }
            Err(_) => {
                log::error!(
                    "Encoder did not finish within {:?}, killed",
                    self.config.timeout
                );
                return Err(TtsError::Encoding(format!(
                    "encoder timed out after {:?}",
                    self.config.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("Encoder exited with {}: {}", output.status, stderr.trim());
            return Err(TtsError::Encoding(format!(
                "encoder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        log::debug!("Encoder finished in {:.2?}", started.elapsed());
        Ok(())
    }
}

/// Remove a temp file now and report failures. Dropping a [`TempPath`] also
/// removes it, silently.
fn release(path: TempPath) {
    let display = path.display().to_string();
    if let Err(e) = path.close() {
        log::warn!("Failed to remove temp file {display}: {e}");
    }
}
