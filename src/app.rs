use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::audio::{CaptureSource, MicCapture};
use crate::config::Config;
use crate::engine::EngineProcess;
use crate::error::Result;
use crate::protocol::ClientConfig;
use crate::session::{SessionConfig, SessionSummary, StreamingSession};

/// Run one streaming session end to end: session directory, optional
/// engine subprocess, connect, stream until a signal / fault / peer close,
/// then drain and flush.
///
/// Expects a validated [`Config`]. The engine (when autostarted) outlives
/// the session and is terminated after it closes, whatever the outcome.
pub async fn run(config: Config) -> Result<SessionSummary> {
    let session_dir = Path::new(&config.recording.output_dir)
        .join(Local::now().format("session_%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&session_dir)?;
    info!("Session directory: {}", session_dir.display());

    let engine = if config.engine.autostart {
        Some(EngineProcess::spawn(
            &config.engine,
            &config.server.host,
            config.server.port,
        )?)
    } else {
        None
    };

    let result = run_session(&config, session_dir).await;

    if let Some(engine) = engine {
        engine.terminate().await;
    }

    result
}

async fn run_session(config: &Config, session_dir: PathBuf) -> Result<SessionSummary> {
    // Resolve the microphone before touching the network so a missing
    // device is reported without a session directory full of nothing.
    let capture: Box<dyn CaptureSource> = Box::new(MicCapture::new(config.audio.clone())?);

    let hello = ClientConfig::new(
        &config.server.model,
        &config.server.language,
        config.audio.sample_rate,
        config.audio.channels,
        &config.vad,
    )?;

    let session_config = SessionConfig {
        websocket_url: config.server.websocket_url(),
        connect_timeout: Duration::from_secs(config.server.connect_timeout_secs),
        session_dir,
        hello,
    };

    let mut session = StreamingSession::connect(session_config, capture).await?;

    if let Err(e) = session.start().await {
        warn!("Session never reached the active state");
        session.close().await;
        return Err(e);
    }

    println!("\nListening... (press Ctrl+C to stop)\n");

    let signaled = tokio::select! {
        _ = shutdown_signal() => true,
        _ = session.wait() => false,
    };

    if signaled {
        session.stop();
        session.wait().await;
    }

    Ok(session.close().await)
}

/// Resolve on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = wait_for_sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // Ctrl+C still covers non-Unix hosts
    std::future::pending::<()>().await
}
