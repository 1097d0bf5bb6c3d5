use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lapse_core::config::{CaptureSource, LapseConfig};
use lapse_pipeline::{
    CaptureTask, CloudinarySink, CommandFrameSource, FrameSource, LifecycleController,
    LifecyclePlan, NullSink, RetentionTask, Staging, UploadSink,
};
use lapse_scheduler::{SchedulerEngine, SchedulerHandle};
use tracing::{info, warn};

mod app;
mod http;

#[derive(Parser)]
#[command(name = "lapse-gateway", version, about = "Scheduled screen capture service")]
struct Cli {
    /// Path to lapse.toml (defaults to ./lapse.toml).
    #[arg(long, env = "LAPSE_CONFIG")]
    config: Option<PathBuf>,

    /// Override gateway.bind.
    #[arg(long)]
    bind: Option<String>,

    /// Override gateway.port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real env vars win.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lapse_gateway=info,lapse_pipeline=info,lapse_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let mut config = LapseConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        LapseConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let staging = Staging::new(&config.staging.dir);
    staging
        .ensure()
        .await
        .with_context(|| format!("creating staging dir {}", staging.dir().display()))?;
    info!(dir = %staging.dir().display(), "staging directory ready");

    let capture = Arc::new(CaptureTask::new(
        build_frame_source(&config)?,
        build_sink(&config),
        staging.clone(),
        config.capture.folder.clone(),
    ));
    let retention = Arc::new(RetentionTask::new(staging));

    // scheduler: management handle for the controller + engine for the background loop
    let scheduler = SchedulerHandle::new();
    let engine = SchedulerEngine::new(
        scheduler.clone(),
        Duration::from_millis(config.scheduler.tick_ms),
    );

    let plan = LifecyclePlan {
        capture_every: Duration::from_secs(config.capture.interval_secs),
        cleanup_hour: config.retention.hour,
        cleanup_minute: config.retention.minute,
    };
    let lifecycle = LifecycleController::new(scheduler, capture.clone(), retention, plan)?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config, lifecycle, capture));
    let router = app::build_router(state)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!(
        commit = env!("LAPSE_GIT_SHA"),
        "Lapse gateway listening on {}", addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = engine_task.await;
    info!("Lapse gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn build_sink(config: &LapseConfig) -> Arc<dyn UploadSink> {
    match config.cloudinary {
        Some(ref cloudinary) => {
            info!(
                cloud = %cloudinary.cloud_name,
                "upload sink: Cloudinary ({})", cloudinary.base_url
            );
            Arc::new(CloudinarySink::new(cloudinary))
        }
        None => {
            warn!(
                "no Cloudinary credentials (set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY, \
                 CLOUDINARY_API_SECRET); captures will fail to upload"
            );
            Arc::new(NullSink)
        }
    }
}

fn build_frame_source(config: &LapseConfig) -> anyhow::Result<Arc<dyn FrameSource>> {
    match config.capture.source {
        CaptureSource::Command => {
            info!(command = %config.capture.command, "frame source: command");
            Ok(Arc::new(CommandFrameSource::new(
                config.capture.command.clone(),
                Duration::from_secs(config.capture.command_timeout_secs),
            )))
        }
        #[cfg(feature = "screen")]
        CaptureSource::Screen => {
            info!("frame source: primary monitor");
            Ok(Arc::new(lapse_pipeline::ScreenFrameSource))
        }
        #[cfg(not(feature = "screen"))]
        CaptureSource::Screen => {
            anyhow::bail!("capture.source = \"screen\" needs lapse-gateway built with --features screen")
        }
    }
}
