//! Kokoro-82M text-to-speech pipelines.
//!
//! Each [`KokoroPipeline`] owns a Kokoro ONNX session and phonemizes input in
//! one language with espeak-ng. [`KokoroFactory`] plugs the engine into the
//! [`PipelineCache`](crate::cache::PipelineCache).
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model (88MB, CPU-optimized)
//! ├── voices-v1.0.bin                  # Voice data archive (.npz format)
//! └── config.json                      # Optional, vocabulary
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>
//!
//! Voices follow the pattern `{language letter}{f|m}_{name}`, e.g. `af_heart`
//! (American English, female) or `em_alex` (Spanish, male). The default voice
//! for each language lives in [`crate::language`].

pub mod model;
pub mod phonemizer;
pub mod pipeline;
pub mod vocab;
pub mod voices;

pub use model::{KokoroError, SAMPLE_RATE};
pub use phonemizer::EspeakConfig;
pub use pipeline::{KokoroFactory, KokoroModelParams, KokoroPipeline};
