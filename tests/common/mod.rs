//! Fake pipelines, a shell-script encoder and a server on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kokoro_tts_server::{
    cache::PipelineCache,
    encoder::{EncoderBridge, EncoderConfig, EncoderConfigBuilder},
    language::{LanguageProfile, LanguageTable},
    server::{self, Server},
    BoxError, PipelineFactory, SpeechPipeline, SynthesisResult,
};
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Encoder that writes an Ogg-looking payload to its last argument.
pub const OGG_ENCODER: &str = "for last; do :; done\nprintf 'OggS fake-opus' > \"$last\"\n";

/// Encoder that fails like ffmpeg without libopus.
pub const FAILING_ENCODER: &str = "echo 'Unknown encoder libopus' >&2\nexit 1\n";

/// How fake pipelines behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// A short sine tone
    Tone,
    /// Model error
    Fail,
    /// Success with no samples
    Silent,
}

/// Counters shared by a [`FakeFactory`] and its pipelines.
#[derive(Debug, Default)]
pub struct Probe {
    pub constructions: AtomicUsize,
    pub syntheses: AtomicUsize,
}

impl Probe {
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn syntheses(&self) -> usize {
        self.syntheses.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory {
    probe: Arc<Probe>,
    behavior: Behavior,
}

impl FakeFactory {
    pub fn new(behavior: Behavior) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Self {
                probe: Arc::clone(&probe),
                behavior,
            },
            probe,
        )
    }
}

impl PipelineFactory for FakeFactory {
    fn create(&self, profile: &LanguageProfile) -> Result<Box<dyn SpeechPipeline>, BoxError> {
        self.probe.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePipeline {
            probe: Arc::clone(&self.probe),
            behavior: self.behavior,
            expected_voice: profile.default_voice,
        }))
    }
}

struct FakePipeline {
    probe: Arc<Probe>,
    behavior: Behavior,
    expected_voice: &'static str,
}

impl SpeechPipeline for FakePipeline {
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisResult, BoxError> {
        self.probe.syntheses.fetch_add(1, Ordering::SeqCst);
        assert_eq!(voice, self.expected_voice);
        match self.behavior {
            Behavior::Fail => Err(format!("model failed on {text:?}").into()),
            Behavior::Silent => Ok(SynthesisResult {
                samples: Vec::new(),
                sample_rate: 24_000,
            }),
            Behavior::Tone => Ok(SynthesisResult {
                samples: (0..4800)
                    .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 24_000.0).sin() * 0.2)
                    .collect(),
                sample_rate: 24_000,
            }),
        }
    }
}

/// Encoder config running `script` with `/bin/sh`; temp files go to `work_dir`.
pub fn script_encoder(script_dir: &Path, script: &str, work_dir: PathBuf) -> EncoderConfig {
    let script_path = script_dir.join("encoder.sh");
    std::fs::write(&script_path, script).unwrap();
    EncoderConfigBuilder::default()
        .program("/bin/sh")
        .program_args(vec![script_path.display().to_string()])
        .temp_dir(work_dir)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A running server backed by fakes.
pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    pub probe: Arc<Probe>,
    dir: TempDir,
}

impl TestServer {
    pub async fn start(behavior: Behavior, encoder_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let encoder = script_encoder(dir.path(), encoder_script, dir.path().join("work"));
        let (factory, probe) = FakeFactory::new(behavior);

        let pipelines = PipelineCache::new(LanguageTable::builtin(), Arc::new(factory));
        let server = Server::new(pipelines, EncoderBridge::new(encoder));
        let router = server::router(Arc::new(server));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            server::serve(listener, router, async move {
                rx.await.ok();
            })
            .await
            .ok();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            probe,
            dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn post_tts(&self, body: serde_json::Value) -> reqwest::Response {
        self.client.post(self.url("/tts")).json(&body).send().await.unwrap()
    }

    /// Files left in the encoder's temp directory.
    pub fn leftover_temp_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.dir.path().join("work")) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}
