use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::phonemizer::{phonemize, EspeakConfig};
use super::vocab::{self, Vocab};
use super::voices::{StyleVector, VoiceStore};

/// Maximum number of phoneme tokens per inference call (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

/// Output sample rate of the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// 10ms @ 24kHz, blended between consecutive chunks.
const CHUNK_CROSSFADE_SAMPLES: usize = 240;

/// Token ids of `; : , . ! ?`, preferred chunk boundaries.
const BREAK_TOKEN_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

const PREFERRED_ONNX_FILE: &str = "kokoro-quant-convinteger.onnx";
const VOICES_FILE: &str = "voices-v1.0.bin";
const CONFIG_FILE: &str = "config.json";

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Missing model file: {0}")]
    MissingFile(PathBuf),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found in {VOICES_FILE}")]
    VoiceNotFound(String),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Model returned no waveform output")]
    EmptyOutput,
}

/// How the loaded graph names and types its inputs. Kokoro exports differ
/// between `input_ids`/`tokens` and int32/float32 speed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InputLayout {
    tokens_name: String,
    speed_is_int32: bool,
}

impl InputLayout {
    fn detect(session: &Session) -> Self {
        let mut layout = Self {
            tokens_name: "input_ids".to_string(),
            speed_is_int32: true,
        };
        for input in session.inputs() {
            match input.name() {
                "input_ids" | "tokens" => layout.tokens_name = input.name().to_string(),
                "speed" => {
                    let dtype = format!("{:?}", input.dtype());
                    layout.speed_is_int32 = dtype.to_ascii_lowercase().contains("int32");
                }
                _ => {}
            }
        }
        layout
    }
}

/// A loaded Kokoro ONNX session together with its voices and vocabulary.
pub struct KokoroModel {
    session: Session,
    layout: InputLayout,
    voices: VoiceStore,
    vocab: Vocab,
}

impl KokoroModel {
    /// Load the model from `model_dir`.
    ///
    /// Expects an `.onnx` file (preferring `kokoro-quant-convinteger.onnx`),
    /// `voices-v1.0.bin`, and optionally `config.json` for the vocabulary.
    pub fn load(
        model_dir: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = open_session(&onnx_path, num_threads, optimized_cache_path)?;
        let layout = InputLayout::detect(&session);
        log::debug!(
            "Kokoro inputs: tokens='{}', speed_is_int32={}",
            layout.tokens_name,
            layout.speed_is_int32
        );

        let voices_path = model_dir.join(VOICES_FILE);
        if !voices_path.is_file() {
            return Err(KokoroError::MissingFile(voices_path));
        }
        let voices = VoiceStore::load(&voices_path)?;

        let config_path = model_dir.join(CONFIG_FILE);
        let vocab = if config_path.is_file() {
            vocab::load_vocab(&config_path)?
        } else {
            log::warn!("{CONFIG_FILE} not found in {}, using built-in vocab", model_dir.display());
            vocab::builtin_vocab()
        };

        Ok(Self {
            session,
            layout,
            voices,
            vocab,
        })
    }

    pub fn has_voice(&self, voice: &str) -> bool {
        self.voices.contains(voice)
    }

    pub fn list_voices(&self) -> Vec<&str> {
        self.voices.names()
    }

    /// Phonemize `text` in espeak language `lang` and render it with `voice`.
    ///
    /// Returns an empty buffer when the text produced no phonemes.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        voice: &str,
        lang: &str,
        speed: f32,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, KokoroError> {
        let ids = phonemize(text, lang, &self.vocab, espeak)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(Vec::new());
        }

        // One style row for the whole utterance, keyed by total token count,
        // so prosody does not jump between chunks.
        let style = self.voices.style(voice, ids.len())?;

        let mut combined = Vec::with_capacity(ids.len() * 300);
        for chunk in split_at_breaks(&ids, MAX_PHONEME_LEN) {
            let audio = self.run_chunk(chunk, &style, speed)?;
            append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
        }
        Ok(combined)
    }

    /// Run the graph on one chunk of token ids.
    fn run_chunk(
        &mut self,
        tokens: &[i64],
        style: &StyleVector,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        // [[0, t1..tN, 0]]
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens_arr = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style_view = ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;
        let tokens_name = self.layout.tokens_name.as_str();

        let outputs = if self.layout.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed.round() as i32]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        };

        let (_, waveform) = outputs.iter().next().ok_or(KokoroError::EmptyOutput)?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }
}

fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join(PREFERRED_ONNX_FILE);
    if preferred.is_file() {
        return Ok(preferred);
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "onnx") {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| KokoroError::MissingFile(model_dir.join("*.onnx")))
}

/// Build the ONNX session, reusing a pre-optimized graph when one is cached.
///
/// Level3 optimization of the Kokoro graph takes several seconds. With a
/// cache path, the first load writes the optimized graph there and later
/// loads read it back with optimization disabled.
fn open_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let mut builder = Session::builder()?
        .with_execution_providers(vec![CPUExecutionProvider::default().build()])?
        .with_parallel_execution(true)?;

    let load_path = match optimized_cache_path {
        Some(cache) if cache.is_file() => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            builder = builder.with_optimization_level(GraphOptimizationLevel::Disable)?;
            cache
        }
        Some(cache) => {
            log::info!(
                "Optimizing Kokoro graph, saving result to {}",
                cache.display()
            );
            builder = builder
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_optimized_model_path(cache)?;
            onnx_path
        }
        None => {
            builder = builder.with_optimization_level(GraphOptimizationLevel::Level3)?;
            onnx_path
        }
    };

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Split token ids into chunks of at most `max_len`, cutting after the last
/// punctuation token inside each window when there is one.
fn split_at_breaks(ids: &[i64], max_len: usize) -> Vec<&[i64]> {
    let mut chunks = Vec::new();
    let mut rest = ids;

    while rest.len() > max_len {
        let cut = rest[..max_len]
            .iter()
            .rposition(|id| BREAK_TOKEN_IDS.contains(id))
            .map_or(max_len, |pos| pos + 1);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Append `src` to `dst`, linearly blending the first `crossfade` samples of
/// `src` over the tail of `dst`.
fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade: usize) {
    let overlap = crossfade.min(dst.len()).min(src.len());
    let start = dst.len() - overlap;

    for (i, (left, right)) in dst[start..].iter_mut().zip(&src[..overlap]).enumerate() {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        *left = *left * (1.0 - t) + right * t;
    }
    dst.extend_from_slice(&src[overlap..]);
}
