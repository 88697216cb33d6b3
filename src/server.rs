//! HTTP surface: `POST /tts` and `GET /health`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::PipelineCache;
use crate::encoder::{EncodedAudio, EncoderBridge};
use crate::error::{Result, TtsError};
use crate::language::{LanguageProfile, DEFAULT_LANGUAGE};

/// Service name reported by `/health` unless configured otherwise.
pub const DEFAULT_SERVICE_NAME: &str = "tts_server";

/// Number of characters of the input text written to the log.
const LOGGED_TEXT_CHARS: usize = 50;

/// Body of `POST /tts`.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    /// Text to synthesize
    #[serde(default)]
    pub text: String,
    /// Language code, defaults to `en`
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// A request that passed validation.
#[derive(Debug)]
struct ValidatedRequest {
    id: Uuid,
    text: String,
    profile: &'static LanguageProfile,
}

/// Encoded speech plus the id of the request that produced it.
#[derive(Debug)]
pub struct SpeechResponse {
    pub request_id: Uuid,
    pub audio: EncodedAudio,
}

impl IntoResponse for SpeechResponse {
    fn into_response(self) -> Response {
        let disposition = format!(
            "attachment; filename=\"speech_{}.{}\"",
            self.request_id, self.audio.extension
        );
        match Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, self.audio.content_type)
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::from(self.audio.bytes))
        {
            Ok(response) => response,
            Err(e) => TtsError::Internal(format!("failed to build response: {e}")).into_response(),
        }
    }
}

/// Ties the pipeline cache and the encoder together for one request at a time.
pub struct Server {
    pipelines: PipelineCache,
    encoder: EncoderBridge,
    service_name: String,
}

impl Server {
    pub fn new(pipelines: PipelineCache, encoder: EncoderBridge) -> Self {
        Self {
            pipelines,
            encoder,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run one request through validation, synthesis and encoding.
    pub async fn synthesize(&self, request: TtsRequest) -> Result<SpeechResponse> {
        let request = self.validate(request)?;
        let started = Instant::now();

        log::info!(
            "Processing TTS request: {}, Language: {}, Text: {}",
            request.id,
            request.profile.code,
            preview(&request.text)
        );

        let pipeline = self.pipelines.get_or_create_for(request.profile).await?;

        let voice = request.profile.default_voice;
        let text = request.text;
        let audio = tokio::task::spawn_blocking(move || pipeline.synthesize(&text, voice))
            .await
            .map_err(|e| TtsError::Internal(format!("synthesis task failed: {e}")))?
            .map_err(|e| {
                log::error!("Synthesis failed for request {}: {e}", request.id);
                TtsError::Synthesis(e.to_string())
            })?;

        if audio.samples.is_empty() {
            return Err(TtsError::Synthesis("no audio generated from text".to_string()));
        }
        log::debug!(
            "Request {} synthesized {:.2}s of audio",
            request.id,
            audio.duration_secs()
        );

        let encoded = self.encoder.encode(audio, request.id).await?;

        log::info!(
            "Request {} completed in {:.2?} ({} bytes)",
            request.id,
            started.elapsed(),
            encoded.bytes.len()
        );

        Ok(SpeechResponse {
            request_id: request.id,
            audio: encoded,
        })
    }

    fn validate(&self, request: TtsRequest) -> Result<ValidatedRequest> {
        if request.text.trim().is_empty() {
            return Err(TtsError::Validation("text must not be empty".to_string()));
        }
        let profile = self.pipelines.languages().resolve(&request.lang)?;

        Ok(ValidatedRequest {
            id: Uuid::new_v4(),
            text: request.text,
            profile,
        })
    }
}

/// Build the service router.
pub fn router(server: Arc<Server>) -> Router {
    Router::new()
        .route("/tts", post(text_to_speech))
        .route("/health", get(health))
        .with_state(server)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn text_to_speech(
    State(server): State<Arc<Server>>,
    payload: std::result::Result<Json<TtsRequest>, JsonRejection>,
) -> Result<SpeechResponse> {
    let Json(request) = payload.map_err(|rejection| {
        TtsError::Validation(format!("invalid request body: {}", rejection.body_text()))
    })?;

    server.synthesize(request).await.inspect_err(|e| {
        log::warn!("TTS request failed: {e}");
    })
}

async fn health(State(server): State<Arc<Server>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: server.service_name().to_string(),
    })
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(LOGGED_TEXT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_language_and_text() {
        let request: TtsRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.lang, "en");
        assert!(request.text.is_empty());

        let request: TtsRequest =
            serde_json::from_str(r#"{"text": "Hola", "lang": "es"}"#).unwrap();
        assert_eq!(request.text, "Hola");
        assert_eq!(request.lang, "es");
    }

    #[test]
    fn preview_truncates_long_text_on_char_boundary() {
        let text = "é".repeat(60);
        let shown = preview(&text);
        assert_eq!(shown.chars().count(), LOGGED_TEXT_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn speech_response_sets_audio_headers() {
        let id = Uuid::new_v4();
        let response = SpeechResponse {
            request_id: id,
            audio: EncodedAudio {
                bytes: b"OggS".to_vec(),
                content_type: "audio/ogg".to_string(),
                extension: "ogg".to_string(),
            },
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/ogg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"speech_{id}.ogg\"").as_str()
        );
    }
}
