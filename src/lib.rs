//! # kokoro-tts-server
//!
//! A small HTTP service that turns text into compressed speech audio using
//! the Kokoro engine.
//!
//! ## Request flow
//!
//! 1. The requested language code is resolved against the built-in
//!    [`language::LanguageTable`].
//! 2. The [`cache::PipelineCache`] hands out a per-language [`SpeechPipeline`],
//!    building it on first use.
//! 3. The pipeline synthesizes raw samples ([`SynthesisResult`]).
//! 4. The [`encoder::EncoderBridge`] transcodes them to Ogg/Opus with an
//!    external encoder (ffmpeg by default).
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-tts-server = { version = "0.1", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use kokoro_tts_server::{
//!     cache::PipelineCache, encoder::{EncoderBridge, EncoderConfig},
//!     engines::kokoro::KokoroFactory, language::LanguageTable, server::{self, Server},
//! };
//!
//! let factory = KokoroFactory::new("models/kokoro");
//! let pipelines = PipelineCache::new(LanguageTable::builtin(), Arc::new(factory));
//! let server = Arc::new(Server::new(pipelines, EncoderBridge::new(EncoderConfig::default())));
//! let app = server::router(server);
//! ```

pub mod cache;
pub mod config;
pub mod encoder;
pub mod engines;
pub mod error;
pub mod language;
pub mod server;

use std::path::Path;

use language::LanguageProfile;

/// Error type used at the pipeline trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro)
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A synthesis context bound to one language.
///
/// Handles are expensive to build and cheap to reuse; the
/// [`cache::PipelineCache`] keeps one per language for the process lifetime.
/// Implementations must tolerate concurrent calls.
pub trait SpeechPipeline: Send + Sync {
    /// Synthesize `text` with the given voice identifier.
    ///
    /// Blocking; callers on an async runtime should move this onto the
    /// blocking pool.
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisResult, BoxError>;
}

/// Builds [`SpeechPipeline`]s for language profiles.
pub trait PipelineFactory: Send + Sync {
    /// Construct a new pipeline for `profile`. Blocking and potentially slow.
    fn create(&self, profile: &LanguageProfile) -> Result<Box<dyn SpeechPipeline>, BoxError>;
}
