//! Per-language pipeline cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::OnceCell;

use crate::error::{Result, TtsError};
use crate::language::{LanguageProfile, LanguageTable};
use crate::{PipelineFactory, SpeechPipeline};

/// Shared handle to a cached pipeline.
pub type PipelineHandle = Arc<dyn SpeechPipeline>;

type Slot = Arc<OnceCell<PipelineHandle>>;

/// Maps language codes to lazily constructed [`SpeechPipeline`]s.
///
/// Starts empty. The first lookup for a language builds its pipeline on the
/// blocking pool; concurrent first lookups for the same language wait on a
/// single construction. Failed constructions are not remembered, so the next
/// lookup retries. Entries live until the cache is dropped.
pub struct PipelineCache {
    languages: LanguageTable,
    factory: Arc<dyn PipelineFactory>,
    slots: Mutex<HashMap<&'static str, Slot>>,
}

impl PipelineCache {
    pub fn new(languages: LanguageTable, factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            languages,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Return the pipeline for `code`, building it on first use.
    ///
    /// Fails with [`TtsError::UnsupportedLanguage`] before touching the
    /// factory when the code is unknown.
    pub async fn get_or_create(&self, code: &str) -> Result<PipelineHandle> {
        let profile = self.languages.resolve(code)?;
        self.get_or_create_for(profile).await
    }

    /// Same as [`get_or_create`](Self::get_or_create) for an already resolved profile.
    pub async fn get_or_create_for(&self, profile: &'static LanguageProfile) -> Result<PipelineHandle> {
        let slot = self.slot(profile.code);
        let handle = slot
            .get_or_try_init(|| self.construct(profile))
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Build pipelines for `codes` ahead of the first request.
    pub async fn preload<I, S>(&self, codes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for code in codes {
            self.get_or_create(code.as_ref()).await?;
        }
        Ok(())
    }

    /// Whether a pipeline for `code` has been built.
    pub fn is_cached(&self, code: &str) -> bool {
        let Ok(profile) = self.languages.resolve(code) else {
            return false;
        };
        self.lock_slots()
            .get(profile.code)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of built pipelines.
    pub fn len(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn construct(&self, profile: &'static LanguageProfile) -> Result<PipelineHandle> {
        log::info!(
            "Initializing new pipeline for language: {} ({})",
            profile.code,
            profile.label
        );
        let started = Instant::now();
        let factory = Arc::clone(&self.factory);

        let pipeline = tokio::task::spawn_blocking(move || factory.create(profile))
            .await
            .map_err(|e| TtsError::Internal(format!("pipeline construction task failed: {e}")))?
            .map_err(|e| {
                log::error!("Failed to initialize pipeline for {}: {e}", profile.code);
                TtsError::Synthesis(format!(
                    "failed to initialize pipeline for '{}': {e}",
                    profile.code
                ))
            })?;

        log::info!(
            "Pipeline for {} ready in {:.2?}",
            profile.code,
            started.elapsed()
        );
        Ok(PipelineHandle::from(pipeline))
    }

    fn slot(&self, code: &'static str) -> Slot {
        Arc::clone(self.lock_slots().entry(code).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Slot>> {
        // The map is only touched for single inserts and lookups, a poisoned
        // guard still holds a consistent map.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
