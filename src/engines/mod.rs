//! Speech synthesis engines.
//!
//! Engines implement [`PipelineFactory`](crate::PipelineFactory) and
//! [`SpeechPipeline`](crate::SpeechPipeline).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `kokoro` - Kokoro TTS (ONNX format, espeak-ng required)

#[cfg(feature = "kokoro")]
pub mod kokoro;
