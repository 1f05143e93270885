use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::error::{RelayError, Result};

/// Capture channel depth. At the default 1024-sample chunks and 16kHz this
/// buffers roughly two seconds before frames start dropping.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// How often the capture worker polls its stop flag.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One chunk of 16-bit PCM audio, interleaved.
///
/// The capture source emits whole chunks only; a partial tail left in the
/// chunker when capture stops is discarded.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioFrame {
    /// Wire form: little-endian PCM bytes, one binary WebSocket frame.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Audio capture source trait
///
/// Implementations:
/// - `MicCapture`: cpal microphone input (all platforms)
/// - test doubles that feed scripted frames
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio; safe to call more than once
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Frames discarded because the consumer fell behind
    fn frames_dropped(&self) -> usize {
        0
    }

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Microphone capture via cpal.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated worker
/// thread for the whole capture. The audio callback chunks samples into
/// exactly `chunk_size`-sample frames and forwards them over a bounded
/// channel; when the consumer falls behind, frames are dropped and counted
/// rather than stalling the device callback.
pub struct MicCapture {
    config: AudioConfig,
    device_label: String,
    capturing: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MicCapture {
    /// Resolve the configured input device. Fails early with
    /// `DeviceUnavailable` so a missing microphone is reported before any
    /// session state exists.
    pub fn new(config: AudioConfig) -> Result<Self> {
        let device = resolve_device(config.device.as_deref())?;
        let device_label = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string());

        info!("Using audio input device: {}", device_label);

        Ok(Self {
            config,
            device_label,
            capturing: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicUsize::new(0)),
            worker: None,
        })
    }
}

#[async_trait::async_trait]
impl CaptureSource for MicCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(RelayError::Capture {
                message: "capture already started".to_string(),
            });
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.stop_flag.store(false, Ordering::SeqCst);
        let config = self.config.clone();
        let stop_flag = Arc::clone(&self.stop_flag);
        let capturing = Arc::clone(&self.capturing);
        let dropped = Arc::clone(&self.dropped);

        // The worker owns the cpal stream from build to drop; only flags and
        // channels cross the thread boundary.
        let worker = thread::spawn(move || {
            let stream = match build_capture_stream(&config, frame_tx, Arc::clone(&dropped)) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(RelayError::Capture {
                    message: format!("failed to start audio stream: {}", e),
                }));
                return;
            }

            capturing.store(true, Ordering::SeqCst);
            if ready_tx.send(Ok(())).is_err() {
                return;
            }

            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(WORKER_POLL_INTERVAL);
            }

            drop(stream);
            capturing.store(false, Ordering::SeqCst);

            let dropped_total = dropped.load(Ordering::Relaxed);
            if dropped_total > 0 {
                warn!("Capture dropped {} frames (consumer fell behind)", dropped_total);
            }
            debug!("Capture worker exited");
        });

        self.worker = Some(worker);

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(
                    "Microphone capture started: {}Hz, {} channel(s), {}-sample chunks",
                    self.config.sample_rate, self.config.channels, self.config.chunk_size
                );
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.join_worker().await;
                Err(e)
            }
            Err(_) => {
                self.join_worker().await;
                Err(RelayError::Capture {
                    message: "capture worker exited before reporting readiness".to_string(),
                })
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.join_worker().await;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn frames_dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn name(&self) -> &str {
        &self.device_label
    }
}

impl MicCapture {
    async fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let joined = tokio::task::spawn_blocking(move || worker.join()).await;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Capture worker panicked"),
                Err(e) => warn!("Failed to join capture worker: {}", e),
            }
        }
    }
}

/// Accumulates callback samples and emits exact `chunk_size` frames.
struct Chunker {
    pending: Vec<i16>,
    chunk_size: usize,
    sample_rate: u32,
    channels: u16,
    frame_tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicUsize>,
}

impl Chunker {
    fn push(&mut self, samples: &[i16]) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.chunk_size {
            let rest = self.pending.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.pending, rest);

            let frame = AudioFrame {
                samples: chunk,
                sample_rate: self.sample_rate,
                channels: self.channels,
            };

            // try_send keeps the device callback non-blocking; a full
            // channel means the network side is behind and the frame is
            // dropped by contract.
            if self.frame_tx.try_send(frame).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Build the cpal input stream at the requested rate/channels, converting
/// the device's native sample format to i16.
fn build_capture_stream(
    config: &AudioConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    let device = resolve_device(config.device.as_deref())?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let sample_format = device
        .default_input_config()
        .map_err(|e| RelayError::Capture {
            message: format!("failed to query input config: {}", e),
        })?
        .sample_format();

    let mut chunker = Chunker {
        pending: Vec::with_capacity(config.chunk_size * 2),
        chunk_size: config.chunk_size,
        sample_rate: config.sample_rate,
        channels: config.channels,
        frame_tx,
        dropped,
    };

    let err_callback = |err| {
        warn!("Audio stream error: {}", err);
    };

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                chunker.push(data);
            },
            err_callback,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> =
                    data.iter().map(|&s| (s as i32 - 32_768) as i16).collect();
                chunker.push(&converted);
            },
            err_callback,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                chunker.push(&converted);
            },
            err_callback,
            None,
        ),
        other => {
            return Err(RelayError::Capture {
                message: format!("unsupported input sample format: {:?}", other),
            })
        }
    };

    stream.map_err(|e| RelayError::Capture {
        message: format!("failed to build input stream: {}", e),
    })
}

/// Find the input device by name, or the host default when no name is given.
fn resolve_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match name {
        Some(name) => {
            let devices = host.input_devices().map_err(|e| RelayError::Capture {
                message: format!("failed to enumerate input devices: {}", e),
            })?;

            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name == name {
                        return Ok(device);
                    }
                }
            }

            Err(RelayError::DeviceUnavailable {
                device: name.to_string(),
            })
        }
        None => host
            .default_input_device()
            .ok_or_else(|| RelayError::DeviceUnavailable {
                device: "default".to_string(),
            }),
    }
}

/// List input device names, marking the host default.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    let devices = host.input_devices().map_err(|e| RelayError::Capture {
        message: format!("failed to enumerate input devices: {}", e),
    })?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if Some(&name) == default_name.as_ref() {
                names.push(format!("{} (default)", name));
            } else {
                names.push(name);
            }
        }
    }

    Ok(names)
}
