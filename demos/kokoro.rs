//! Synthesize one sentence per language and write Ogg/Opus files next to the
//! working directory, bypassing HTTP.

use std::sync::Arc;
use std::time::Instant;

use kokoro_tts_server::{
    cache::PipelineCache,
    encoder::{EncoderBridge, EncoderConfig},
    engines::kokoro::KokoroFactory,
    language::LanguageTable,
    BoxError,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    let pipelines = PipelineCache::new(
        LanguageTable::builtin(),
        Arc::new(KokoroFactory::new("models/kokoro")),
    );
    let encoder = EncoderBridge::new(EncoderConfig::default());

    let samples = [
        ("en", "Hello! This is Kokoro, speaking through an HTTP wrapper."),
        ("gb", "Good afternoon, this is the British English voice."),
        ("es", "Hola, esta es la voz en español."),
    ];

    for (lang, text) in samples {
        let load_start = Instant::now();
        let pipeline = pipelines.get_or_create(lang).await?;
        println!("[{lang}] pipeline ready in {:.2?}", load_start.elapsed());

        let voice = pipelines.languages().resolve(lang)?.default_voice;
        let synth_start = Instant::now();
        let audio = pipeline.synthesize(text, voice)?;
        let synth_dur = synth_start.elapsed();
        println!(
            "[{lang}] synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
            audio.duration_secs(),
            synth_dur,
            audio.duration_secs() / synth_dur.as_secs_f64()
        );

        let encoded = encoder.encode(audio, Uuid::new_v4()).await?;
        let path = format!("speech_{lang}.{}", encoded.extension);
        std::fs::write(&path, &encoded.bytes)?;
        println!("[{lang}] saved {} bytes to {path}", encoded.bytes.len());
    }

    Ok(())
}
