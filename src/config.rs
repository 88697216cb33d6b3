//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::encoder::{EncoderConfig, EncoderConfigBuilder, EncoderConfigBuilderError};
use crate::server::DEFAULT_SERVICE_NAME;

/// Kokoro text-to-speech HTTP server
#[derive(Debug, Clone, Parser)]
#[command(name = "kokoro-tts-server", about = "Serve Kokoro text-to-speech as Ogg/Opus over HTTP")]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:5007", env = "TTS_LISTEN")]
    pub listen: SocketAddr,

    /// Directory containing the Kokoro .onnx model and voices-v1.0.bin
    #[arg(long, default_value = "models/kokoro", env = "TTS_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// ONNX runtime threads per pipeline (defaults to all cores)
    #[arg(long, env = "TTS_NUM_THREADS")]
    pub num_threads: Option<usize>,

    /// Where to cache the optimized ONNX graph between runs
    #[arg(long, env = "TTS_OPTIMIZED_MODEL_CACHE")]
    pub optimized_model_cache: Option<PathBuf>,

    /// Speech speed multiplier
    #[arg(long, default_value_t = 1.0, env = "TTS_SPEED")]
    pub speed: f32,

    /// espeak-ng binary (defaults to `espeak-ng` on PATH)
    #[arg(long, env = "TTS_ESPEAK_BIN")]
    pub espeak_bin: Option<PathBuf>,

    /// espeak-ng data directory
    #[arg(long, env = "TTS_ESPEAK_DATA")]
    pub espeak_data: Option<PathBuf>,

    /// External encoder binary
    #[arg(long, default_value = "ffmpeg", env = "TTS_ENCODER")]
    pub encoder: PathBuf,

    /// Audio codec handed to the encoder
    #[arg(long, default_value = "libopus", env = "TTS_CODEC")]
    pub codec: String,

    /// Target bitrate handed to the encoder
    #[arg(long, default_value = "24k", env = "TTS_BITRATE")]
    pub bitrate: String,

    /// Seconds before a running encoder is killed
    #[arg(long, default_value_t = 60, env = "TTS_ENCODER_TIMEOUT_SECS")]
    pub encoder_timeout_secs: u64,

    /// Directory for temporary audio files (defaults to <system temp>/tts_audio)
    #[arg(long, env = "TTS_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Language codes whose pipelines are built at startup, comma separated
    #[arg(long, value_delimiter = ',', env = "TTS_PRELOAD")]
    pub preload: Vec<String>,

    /// Service name reported by /health
    #[arg(long, default_value = DEFAULT_SERVICE_NAME, env = "TTS_SERVICE_NAME")]
    pub service_name: String,
}

impl Args {
    /// Encoder settings derived from the arguments.
    pub fn encoder_config(&self) -> Result<EncoderConfig, EncoderConfigBuilderError> {
        let mut builder = EncoderConfigBuilder::default();
        builder
            .program(self.encoder.clone())
            .codec(self.codec.clone())
            .bitrate(self.bitrate.clone())
            .timeout(Duration::from_secs(self.encoder_timeout_secs));
        if let Some(dir) = &self.temp_dir {
            builder.temp_dir(dir.clone());
        }
        builder.build()
    }
}
