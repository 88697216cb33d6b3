use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::language::LanguageProfile;
use crate::{BoxError, PipelineFactory, SpeechPipeline, SynthesisResult};

use super::model::{KokoroError, KokoroModel, SAMPLE_RATE};
use super::phonemizer::EspeakConfig;

/// Parameters for configuring Kokoro model loading.
#[derive(Debug, Clone, Default)]
pub struct KokoroModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// The first pipeline writes it, later pipelines (and later runs) load it
    /// without re-optimizing. Must be writable.
    pub optimized_model_cache_path: Option<PathBuf>,
}

/// Builds one [`KokoroPipeline`] per language from a model directory.
///
/// The ONNX session and voice pack are loaded by the first pipeline and
/// shared by the rest; pipelines differ only in their phonemizer language.
///
/// ```rust,no_run
/// use kokoro_tts_server::{engines::kokoro::KokoroFactory, language::LanguageTable, PipelineFactory};
///
/// let factory = KokoroFactory::new("models/kokoro");
/// let profile = LanguageTable::builtin().resolve("en")?;
/// let pipeline = factory.create(profile)?;
/// let audio = pipeline.synthesize("Hello, world!", profile.default_voice)?;
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
#[derive(Debug, Clone)]
pub struct KokoroFactory {
    model_dir: PathBuf,
    params: KokoroModelParams,
    espeak: EspeakConfig,
    speed: f32,
    model: Arc<LoadOnce<SharedModel>>,
}

type SharedModel = Arc<Mutex<KokoroModel>>;

impl KokoroFactory {
    /// Factory for the model in `model_dir`, using `espeak-ng` from PATH.
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            params: KokoroModelParams::default(),
            espeak: EspeakConfig::default(),
            speed: 1.0,
            model: Arc::new(LoadOnce::default()),
        }
    }

    pub fn with_params(mut self, params: KokoroModelParams) -> Self {
        self.params = params;
        self
    }

    /// Use a bundled espeak-ng binary and/or data directory. `None` falls
    /// back to the system install.
    pub fn with_espeak(mut self, bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        self.espeak = EspeakConfig { bin_path, data_path };
        self
    }

    /// Speech speed multiplier, 1.0 by default.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Load a pipeline for `profile`, loading the model on first use.
    pub fn load(&self, profile: &LanguageProfile) -> Result<KokoroPipeline, KokoroError> {
        let model = self.model.get_or_try_load(|| {
            let model = KokoroModel::load(
                &self.model_dir,
                self.params.num_threads,
                self.params.optimized_model_cache_path.as_deref(),
            )?;
            log::info!("Kokoro voice pack has {} voices", model.list_voices().len());
            Ok::<_, KokoroError>(Arc::new(Mutex::new(model)))
        })?;

        let has_voice = model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .has_voice(profile.default_voice);
        if !has_voice {
            return Err(KokoroError::VoiceNotFound(profile.default_voice.to_string()));
        }

        Ok(KokoroPipeline {
            model,
            espeak_lang: profile.espeak_lang,
            espeak: self.espeak.clone(),
            speed: self.speed,
        })
    }
}

impl PipelineFactory for KokoroFactory {
    fn create(&self, profile: &LanguageProfile) -> Result<Box<dyn SpeechPipeline>, BoxError> {
        Ok(Box::new(self.load(profile)?))
    }
}

/// Kokoro model bound to one phonemizer language.
///
/// The ONNX session needs exclusive access, so concurrent requests run one
/// after another, across languages as well.
pub struct KokoroPipeline {
    model: SharedModel,
    espeak_lang: &'static str,
    espeak: EspeakConfig,
    speed: f32,
}

impl SpeechPipeline for KokoroPipeline {
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisResult, BoxError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| "Kokoro model lock poisoned by an earlier panic")?;
        let samples =
            model.synthesize_text(text, voice, self.espeak_lang, self.speed, &self.espeak)?;

        Ok(SynthesisResult {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}

/// A value loaded on first use and cloned out afterwards. Failed loads are
/// not remembered.
struct LoadOnce<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for LoadOnce<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> LoadOnce<T> {
    /// Callers arriving during a load wait for it instead of loading again.
    fn get_or_try_load<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = load()?;
        *slot = Some(value.clone());
        Ok(value)
    }
}

impl<T> fmt::Debug for LoadOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded = self
            .slot
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("LoadOnce").field("loaded", &loaded).finish()
    }
}
