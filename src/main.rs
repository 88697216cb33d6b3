use std::sync::Arc;

use clap::Parser;
use kokoro_tts_server::{
    cache::PipelineCache,
    config::Args,
    encoder::EncoderBridge,
    engines::kokoro::{KokoroFactory, KokoroModelParams},
    language::LanguageTable,
    server::{self, Server},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let factory = KokoroFactory::new(&args.model_dir)
        .with_params(KokoroModelParams {
            num_threads: args.num_threads,
            optimized_model_cache_path: args.optimized_model_cache.clone(),
        })
        .with_espeak(args.espeak_bin.clone(), args.espeak_data.clone())
        .with_speed(args.speed);

    let pipelines = PipelineCache::new(LanguageTable::builtin(), Arc::new(factory));
    if !args.preload.is_empty() {
        log::info!("Preloading pipelines: {}", args.preload.join(", "));
        pipelines.preload(&args.preload).await?;
    }

    let encoder = EncoderBridge::new(args.encoder_config()?);
    let server = Server::new(pipelines, encoder).with_service_name(args.service_name.clone());
    let app = server::router(Arc::new(server));

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    log::info!("Starting TTS server on {}", listener.local_addr()?);

    server::serve(listener, app, shutdown_signal()).await?;

    log::info!("TTS server stopped");
    Ok(())
}

/// Wait for `SIGINT` or `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    log::info!("Shutdown signal received");
}
