#![cfg(unix)]

mod common;

use common::{Behavior, TestServer, FAILING_ENCODER, OGG_ENCODER};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::{json, Value};

async fn error_type(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"]["type"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn hello_world_returns_ogg_audio() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "Hello world!", "lang": "en"})).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[CONTENT_TYPE], "audio/ogg");
    let disposition = resp.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"speech_"));
    assert!(disposition.ends_with(".ogg\""));

    let body = resp.bytes().await.unwrap();
    assert!(body.starts_with(b"OggS"));
    assert!(server.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn every_supported_language_synthesizes() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    for lang in ["en", "gb", "es", "ja", "zh", "fr", "hi", "it", "pt"] {
        let resp = server.post_tts(json!({"text": "Testing", "lang": lang})).await;
        assert_eq!(resp.status(), 200, "{lang}");
        assert!(!resp.bytes().await.unwrap().is_empty(), "{lang}");
    }
    assert_eq!(server.probe.constructions(), 9);
}

#[tokio::test]
async fn language_defaults_to_english_and_ignores_case() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "No language given"})).await;
    assert_eq!(resp.status(), 200);

    let resp = server.post_tts(json!({"text": "Shouting", "lang": "EN"})).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(server.probe.constructions(), 1);
}

#[tokio::test]
async fn empty_text_is_a_validation_error() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "", "lang": "en"})).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(error_type(resp).await, "validation_error");
    assert_eq!(server.probe.syntheses(), 0);
    assert_eq!(server.probe.constructions(), 0);
}

#[tokio::test]
async fn missing_or_blank_text_is_a_validation_error() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    for body in [json!({"lang": "en"}), json!({"text": "   \n"}), json!({"text": 42})] {
        let resp = server.post_tts(body.clone()).await;
        assert_eq!(resp.status(), 400, "{body}");
        assert_eq!(error_type(resp).await, "validation_error", "{body}");
    }
    assert_eq!(server.probe.syntheses(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    let resp = server
        .client()
        .post(server.url("/tts"))
        .header(CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(error_type(resp).await, "validation_error");
}

#[tokio::test]
async fn unknown_language_is_rejected_without_synthesis() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "Hola", "lang": "xx"})).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(error_type(resp).await, "unsupported_language");
    assert_eq!(server.probe.constructions(), 0);
    assert_eq!(server.probe.syntheses(), 0);
}

#[tokio::test]
async fn repeated_requests_reuse_the_pipeline() {
    let server = TestServer::start(Behavior::Tone, OGG_ENCODER).await;

    for _ in 0..3 {
        let resp = server.post_tts(json!({"text": "Again", "lang": "es"})).await;
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(server.probe.constructions(), 1);
    assert_eq!(server.probe.syntheses(), 3);
}

#[tokio::test]
async fn model_failure_is_a_server_error_without_audio() {
    let server = TestServer::start(Behavior::Fail, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "Hello", "lang": "en"})).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(error_type(resp).await, "synthesis_error");
    assert!(server.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn empty_audio_is_a_synthesis_error() {
    let server = TestServer::start(Behavior::Silent, OGG_ENCODER).await;

    let resp = server.post_tts(json!({"text": "...", "lang": "en"})).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(error_type(resp).await, "synthesis_error");
}

#[tokio::test]
async fn encoder_failure_is_a_server_error_and_cleans_up() {
    let server = TestServer::start(Behavior::Tone, FAILING_ENCODER).await;

    let resp = server.post_tts(json!({"text": "Hello", "lang": "en"})).await;

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "encoding_error");
    assert_eq!(body["error"]["code"], 500);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Unknown encoder"));
    assert!(server.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn health_is_ok_regardless_of_failures() {
    let server = TestServer::start(Behavior::Fail, FAILING_ENCODER).await;
    let expected = json!({"status": "ok", "service": "tts_server"});

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), expected);

    let resp = server.post_tts(json!({"text": "Hello", "lang": "en"})).await;
    assert_eq!(resp.status(), 500);
    let resp = server.post_tts(json!({"text": "Hola", "lang": "xx"})).await;
    assert_eq!(resp.status(), 400);

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_collide() {
    let server = std::sync::Arc::new(TestServer::start(Behavior::Tone, OGG_ENCODER).await);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let server = std::sync::Arc::clone(&server);
        tasks.spawn(async move {
            let resp = server
                .post_tts(json!({"text": format!("Request {i}"), "lang": "en"}))
                .await;
            (resp.status(), resp.bytes().await.unwrap())
        });
    }
    while let Some(result) = tasks.join_next().await {
        let (status, body) = result.unwrap();
        assert_eq!(status, 200);
        assert!(body.starts_with(b"OggS"));
    }

    assert_eq!(server.probe.constructions(), 1);
    assert!(server.leftover_temp_files().is_empty());
}
