use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrame, CaptureSource, RecordingArtifact, SessionRecorder};
use crate::error::{RelayError, Result};
use crate::protocol::{classify, ServerMessage};

use super::config::SessionConfig;
use super::state::{RunState, SessionState, StopReason};
use super::summary::SessionSummary;
use super::transcript::TranscriptSink;

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsConnection, Message>;
type WsStream = SplitStream<WsConnection>;

/// Pause between connection attempts while the engine is still binding.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// What the send path hands back when it exits.
#[derive(Debug, Default)]
struct SendOutcome {
    recording: Option<RecordingArtifact>,
    frames_dropped: usize,
}

/// A live duplex session against one server connection.
///
/// The session owns the WebSocket and runs two tasks over its split halves:
/// the send path (capture -> binary frames) and the receive path (text
/// frames -> transcript). Either task, an external `stop`, or the peer can
/// end the session; the shared [`SessionState`] arbitrates so teardown runs
/// exactly once. There is no reconnect: one session per connection.
pub struct StreamingSession {
    config: SessionConfig,
    state: Arc<SessionState>,
    started_at: DateTime<Utc>,
    capture: Option<Box<dyn CaptureSource>>,
    ws_sink: Option<WsSink>,
    ws_stream: Option<WsStream>,
    send_task: Option<JoinHandle<SendOutcome>>,
    recv_task: Option<JoinHandle<TranscriptSink>>,
    send_outcome: Option<SendOutcome>,
    recv_outcome: Option<TranscriptSink>,
}

impl StreamingSession {
    /// Open the WebSocket and send the session hello.
    ///
    /// Connection attempts are retried every 250ms within the configured
    /// timeout window, so an engine that is still binding its port delays
    /// the session instead of failing it. The hello frame is the first
    /// thing the server sees and is immutable afterwards.
    pub async fn connect(
        config: SessionConfig,
        capture: Box<dyn CaptureSource>,
    ) -> Result<Self> {
        let state = Arc::new(SessionState::new());
        state.begin_connecting();

        info!("Connecting to {}...", config.websocket_url);

        let deadline = Instant::now() + config.connect_timeout;
        let mut last_error = String::from("timed out");

        let mut socket = loop {
            match tokio::time::timeout_at(deadline, connect_async(config.websocket_url.as_str()))
                .await
            {
                Ok(Ok((socket, _response))) => break socket,
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(connect_failed(&config, last_error));
                    }
                    debug!("Connection attempt failed ({}), retrying", last_error);
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL.min(remaining)).await;
                }
                Err(_elapsed) => return Err(connect_failed(&config, last_error)),
            }
        };

        let hello = serde_json::to_string(&config.hello)?;
        socket
            .send(Message::Text(hello))
            .await
            .map_err(RelayError::TransportSend)?;

        info!("Connected to server");

        let (ws_sink, ws_stream) = socket.split();

        Ok(Self {
            config,
            state,
            started_at: Utc::now(),
            capture: Some(capture),
            ws_sink: Some(ws_sink),
            ws_stream: Some(ws_stream),
            send_task: None,
            recv_task: None,
            send_outcome: None,
            recv_outcome: None,
        })
    }

    /// Start capture and spawn both paths. The session is Active once this
    /// returns.
    pub async fn start(&mut self) -> Result<()> {
        let (mut capture, ws_sink, ws_stream) = match (
            self.capture.take(),
            self.ws_sink.take(),
            self.ws_stream.take(),
        ) {
            (Some(capture), Some(sink), Some(stream)) => (capture, sink, stream),
            _ => {
                return Err(RelayError::Capture {
                    message: "session already started".to_string(),
                })
            }
        };

        let frames = capture.start().await?;

        self.state.activate();

        let send_task = tokio::spawn(send_path(
            ws_sink,
            frames,
            capture,
            Arc::clone(&self.state),
            self.config.recording_path(),
        ));
        let recv_task = tokio::spawn(receive_path(ws_stream, Arc::clone(&self.state)));

        self.send_task = Some(send_task);
        self.recv_task = Some(recv_task);

        info!("Streaming session started");
        Ok(())
    }

    /// Request shutdown. Idempotent; the first stop trigger wins.
    pub fn stop(&self) {
        if self.state.begin_draining(StopReason::UserStop) {
            info!("Stopping session (user stop)");
        }
    }

    /// Resolve once both paths have exited, for any reason. Safe to race
    /// inside `select!` and call again afterwards.
    pub async fn wait(&mut self) {
        if let Some(task) = self.send_task.as_mut() {
            match task.await {
                Ok(outcome) => self.send_outcome = Some(outcome),
                Err(e) => error!("Audio streaming task panicked: {}", e),
            }
            self.send_task = None;
        }

        if let Some(task) = self.recv_task.as_mut() {
            match task.await {
                Ok(sink) => self.recv_outcome = Some(sink),
                Err(e) => error!("Transcript receiving task panicked: {}", e),
            }
            self.recv_task = None;
        }
    }

    /// Tear the session down: join both paths, flush the transcript, and
    /// report what happened. Artifact write failures are logged, not
    /// propagated; they must not stop the process from exiting.
    pub async fn close(mut self) -> SessionSummary {
        // Sessions can land here from Connecting (startup failure) or
        // Active; either way the paths must be told to stop before joining.
        self.state.begin_draining(StopReason::UserStop);
        self.state.abandon_connecting();
        self.wait().await;

        let send_outcome = self.send_outcome.take().unwrap_or_default();
        let mut transcript = self.recv_outcome.take().unwrap_or_default();
        let transcript_lines = transcript.len();

        let transcript_artifact = match transcript.flush(&self.config.transcript_path()) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("{}", e);
                None
            }
        };

        self.state.mark_closed();

        let stop_reason = self.state.stop_reason().unwrap_or(StopReason::UserStop);
        let duration = Utc::now().signed_duration_since(self.started_at);

        let summary = SessionSummary {
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.state.frames_sent(),
            frames_dropped: send_outcome.frames_dropped,
            transcript_lines,
            stop_reason,
            recording: send_outcome.recording.map(|artifact| artifact.path),
            transcript: transcript_artifact.map(|artifact| artifact.path),
        };

        info!(
            "Session closed ({}): {:.1}s, {} frames sent, {} transcript lines",
            summary.stop_reason.label(),
            summary.duration_secs,
            summary.frames_sent,
            summary.transcript_lines
        );

        summary
    }

    /// Current lifecycle state.
    pub fn run_state(&self) -> RunState {
        self.state.current()
    }

    /// Stop reason recorded by the draining winner, once one exists.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.stop_reason()
    }
}

fn connect_failed(config: &SessionConfig, message: String) -> RelayError {
    RelayError::ConnectFailed {
        url: config.websocket_url.clone(),
        timeout_secs: config.connect_timeout.as_secs(),
        message,
    }
}

/// Resolves once shutdown is signaled. The `watch::Ref` returned by
/// `wait_for` holds a read guard that is not `Send`; it must be dropped in
/// here rather than surface as a `select!` arm value, or the path futures
/// stop being spawnable.
async fn shutdown_signaled(shutdown: &mut watch::Receiver<bool>) {
    // Err would mean the session state dropped; treat that as shutdown too.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Send path: forward captured frames as binary messages, buffering a copy
/// for the session recording. On exit (any cause) it stops the capture
/// source, flushes the recording, and closes the sink so the server sees a
/// clean end of stream.
async fn send_path(
    mut ws_sink: WsSink,
    mut frames: mpsc::Receiver<AudioFrame>,
    mut capture: Box<dyn CaptureSource>,
    state: Arc<SessionState>,
    recording_path: PathBuf,
) -> SendOutcome {
    info!("Audio streaming task started");

    let mut recorder = SessionRecorder::new();
    let mut shutdown = state.subscribe_shutdown();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_signaled(&mut shutdown) => break,

            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    if state.begin_draining(StopReason::CaptureEnded) {
                        warn!("Capture source stopped producing frames");
                    }
                    break;
                };

                match ws_sink.send(Message::Binary(frame.pcm_bytes())).await {
                    Ok(()) => {
                        state.record_frame_sent();
                        recorder.append(frame);
                        // Keep the receive path scheduled even under a
                        // saturated capture channel.
                        tokio::task::yield_now().await;
                    }
                    Err(e) => {
                        if state.begin_draining(StopReason::SendFailed) {
                            error!("Failed to send audio frame: {}", e);
                        }
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = capture.stop().await {
        warn!("Failed to stop capture source: {}", e);
    }
    let frames_dropped = capture.frames_dropped();

    let recording = match recorder.flush(&recording_path) {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("{}", e);
            None
        }
    };

    // The close frame tells the server this session is over; failures here
    // are expected when the transport itself already died.
    if let Err(e) = ws_sink.close().await {
        debug!("WebSocket close: {}", e);
    }

    info!("Audio streaming task stopped");

    SendOutcome {
        recording,
        frames_dropped,
    }
}

/// Receive path: classify inbound text frames, accumulate transcript lines,
/// and surface them on stdout. Returns the sink; the coordinator owns the
/// transcript flush.
async fn receive_path(mut ws_stream: WsStream, state: Arc<SessionState>) -> TranscriptSink {
    info!("Transcript receiving task started");

    let mut sink = TranscriptSink::new();
    let mut shutdown = state.subscribe_shutdown();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_signaled(&mut shutdown) => break,

            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(raw))) => handle_text(&raw, &mut sink),
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Unrecognized server message: unexpected binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        if state.begin_draining(StopReason::PeerClosed) {
                            warn!("WebSocket connection closed by server");
                        }
                        break;
                    }
                    // Ping/pong are transport noise
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if state.begin_draining(StopReason::RecvFailed) {
                            error!("Receive error: {}", e);
                        }
                        break;
                    }
                }
            }
        }
    }

    info!("Transcript receiving task stopped");
    sink
}

/// Handle one inbound text payload. Malformed payloads are logged and
/// dropped; they never end the session.
fn handle_text(raw: &str, sink: &mut TranscriptSink) {
    match classify(raw) {
        Ok(ServerMessage::Transcription(transcription)) => {
            let text = transcription.text.trim();
            if text.is_empty() {
                // No content: VAD fired without usable speech
                return;
            }

            sink.append(text);

            if transcription.is_partial {
                print!("\r{}", text);
                std::io::Write::flush(&mut std::io::stdout()).ok();
            } else {
                println!("\n{}", text);
            }

            if let Some(language) = &transcription.language {
                debug!("Language detected: {}", language);
            }
            if let Some(confidence) = transcription.confidence {
                debug!("Confidence: {:.2}", confidence);
            }
        }
        Ok(ServerMessage::Status(status)) => {
            info!("Server status: {} - {}", status.status, status.message);
            if let Some(progress) = status.progress {
                debug!("Progress: {:.0}%", progress * 100.0);
            }
        }
        Err(e) => {
            warn!("{}", e);
            debug!("Raw message: {}", raw);
        }
    }
}
