// Default-device audio I/O via cpal
//
// cpal streams are not Send, so each stream lives on a dedicated thread that
// owns it for the lifetime of the capture/playback session. Communication
// with the async world goes through channels and atomics only.
//
// Capture: the device's native format is reduced to mono at the capture rate
// by channel-0 selection and integer decimation, assembled into fixed-size
// blocks, and pushed through a bounded channel. If the consumer lags, blocks
// are dropped at the producer.
//
// Playback: a shared sample queue positioned on an absolute frame timeline.
// Scheduling a buffer at time T pads the queue with silence up to T's frame
// and appends the samples; the output callback advances the frame clock
// whether or not the queue has data.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::capture::{CaptureBackend, CaptureBlock, CaptureConfig};
use super::codec::AudioBuffer;
use super::playback::AudioSink;
use crate::error::SessionError;

const CAPTURE_CHANNEL_CAPACITY: usize = 100;

/// Microphone capture backend on the default input device.
pub struct DeviceCaptureBackend {
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl DeviceCaptureBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for DeviceCaptureBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, SessionError> {
        if self.capturing {
            return Err(SessionError::DeviceUnavailable(
                "capture already running".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();

        let thread = std::thread::spawn(move || {
            run_capture(config, tx, ready_tx, stop_flag);
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.thread = Some(thread);
                self.capturing = true;
                info!("microphone capture started");
                Ok(rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::DeviceUnavailable(
                    "capture thread exited before ready".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
            info!("microphone capture stopped");
        }

        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "device"
    }
}

impl Drop for DeviceCaptureBackend {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Accumulates mono capture-rate samples into fixed-size blocks.
struct BlockAssembler {
    tx: mpsc::Sender<CaptureBlock>,
    buf: Vec<f32>,
    block_size: usize,
    sample_rate: u32,
    decimation: usize,
    phase: usize,
    started: Instant,
    dropped: u64,
}

impl BlockAssembler {
    fn extend(&mut self, data: &[f32], native_channels: usize) {
        for frame in data.chunks(native_channels) {
            if self.phase == 0 {
                self.buf.push(frame[0]);
                if self.buf.len() == self.block_size {
                    self.flush();
                }
            }
            self.phase = (self.phase + 1) % self.decimation;
        }
    }

    fn flush(&mut self) {
        let samples = std::mem::replace(&mut self.buf, Vec::with_capacity(self.block_size));
        let block = CaptureBlock {
            samples,
            sample_rate: self.sample_rate,
            timestamp_ms: self.started.elapsed().as_millis() as u64,
        };

        if self.tx.try_send(block).is_err() {
            self.dropped += 1;
            if self.dropped % 50 == 1 {
                warn!(
                    dropped = self.dropped,
                    "capture consumer lagging, dropping blocks"
                );
            }
        }
    }
}

fn run_capture(
    config: CaptureConfig,
    tx: mpsc::Sender<CaptureBlock>,
    ready_tx: oneshot::Sender<Result<(), SessionError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(
                "no default input device".to_string(),
            )));
            return;
        }
    };

    let native = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                "no usable input config: {}",
                e
            ))));
            return;
        }
    };

    let native_channels = native.channels() as usize;
    let native_rate = native.sample_rate().0;
    let decimation = ((native_rate / config.sample_rate).max(1)) as usize;

    info!(
        device = device.name().unwrap_or_else(|_| "unknown".to_string()),
        native_rate,
        native_channels,
        target_rate = config.sample_rate,
        "opening input stream"
    );

    let mut assembler = BlockAssembler {
        tx,
        buf: Vec::with_capacity(config.block_size),
        block_size: config.block_size,
        sample_rate: config.sample_rate,
        decimation,
        phase: 0,
        started: Instant::now(),
        dropped: 0,
    };

    let stream_config = native.config();
    let err_fn = |e: cpal::StreamError| error!(error = %e, "input stream error");

    let stream = match native.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                assembler.extend(data, native_channels);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                assembler.extend(&floats, native_channels);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                "unsupported input sample format {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(map_build_error(e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
            "failed to start input stream: {}",
            e
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
}

fn map_build_error(e: cpal::BuildStreamError) -> SessionError {
    match e {
        // Backend-specific build failures on desktop hosts are how denied
        // microphone access surfaces.
        cpal::BuildStreamError::BackendSpecific { err } => {
            warn!(error = %err, "input stream rejected by backend");
            SessionError::PermissionDenied
        }
        other => SessionError::DeviceUnavailable(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Playback sink
// ---------------------------------------------------------------------------

struct SinkState {
    /// Pending mono samples; the front is the next frame the callback plays
    queue: VecDeque<f32>,
    /// Absolute frame index of the queue front; advances even through silence
    head_frame: u64,
}

/// Speaker output on the default output device.
///
/// Implements [`AudioSink`]: the clock is the count of frames the output
/// callback has consumed, so `now()` tracks real playback position rather
/// than wall time.
pub struct DeviceSink {
    state: Arc<Mutex<SinkState>>,
    sample_rate: u32,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    closed: bool,
}

impl DeviceSink {
    /// Open the default output device at the given mono sample rate.
    pub async fn open(sample_rate: u32) -> Result<Self, SessionError> {
        let state = Arc::new(Mutex::new(SinkState {
            queue: VecDeque::new(),
            head_frame: 0,
        }));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread = std::thread::spawn({
            let state = Arc::clone(&state);
            let stop_flag = Arc::clone(&stop_flag);
            move || run_playback(sample_rate, state, ready_tx, stop_flag)
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(sample_rate, "playback sink opened");
                Ok(Self {
                    state,
                    sample_rate,
                    stop_flag,
                    thread: Some(thread),
                    closed: false,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::DeviceUnavailable(
                    "playback thread exited before ready".to_string(),
                ))
            }
        }
    }
}

impl AudioSink for DeviceSink {
    fn now(&self) -> f64 {
        let state = self.state.lock().unwrap();
        state.head_frame as f64 / self.sample_rate as f64
    }

    fn start_source(
        &mut self,
        _source_id: u64,
        buffer: &AudioBuffer,
        at: f64,
    ) -> Result<(), SessionError> {
        if buffer.sample_rate != self.sample_rate {
            warn!(
                buffer_rate = buffer.sample_rate,
                sink_rate = self.sample_rate,
                "dropping buffer with mismatched sample rate"
            );
            return Ok(());
        }

        let mono: Vec<f32> = match buffer.channels {
            1 => buffer.samples.clone(),
            2 => buffer
                .samples
                .chunks_exact(2)
                .map(|pair| (pair[0] + pair[1]) / 2.0)
                .collect(),
            other => {
                warn!(channels = other, "dropping buffer with unsupported channel count");
                return Ok(());
            }
        };

        let mut state = self.state.lock().unwrap();
        let target_frame = (at * self.sample_rate as f64).round() as u64;
        let queue_end = state.head_frame + state.queue.len() as u64;
        if target_frame > queue_end {
            let padding = (target_frame - queue_end) as usize;
            state.queue.extend(std::iter::repeat(0.0).take(padding));
        }
        state.queue.extend(mono);

        Ok(())
    }

    fn stop_all(&mut self) {
        self.state.lock().unwrap().queue.clear();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("playback sink closed");
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_playback(
    sample_rate: u32,
    state: Arc<Mutex<SinkState>>,
    ready_tx: oneshot::Sender<Result<(), SessionError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(
                "no default output device".to_string(),
            )));
            return;
        }
    };

    let native = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                "no usable output config: {}",
                e
            ))));
            return;
        }
    };

    let native_channels = native.channels() as usize;
    let native_rate = native.sample_rate().0;
    // Hold each sink frame for `repeat` device frames (e.g. 24kHz -> 48kHz)
    let repeat = ((native_rate / sample_rate).max(1)) as usize;

    info!(
        device = device.name().unwrap_or_else(|_| "unknown".to_string()),
        native_rate,
        native_channels,
        sink_rate = sample_rate,
        "opening output stream"
    );

    let stream_config = native.config();
    let err_fn = |e: cpal::StreamError| error!(error = %e, "output stream error");

    let state_cb = Arc::clone(&state);
    let mut current = 0.0f32;
    let mut phase = 0usize;

    let stream = match native.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut st = state_cb.lock().unwrap();
                for frame in data.chunks_mut(native_channels) {
                    if phase == 0 {
                        current = st.queue.pop_front().unwrap_or(0.0);
                        st.head_frame += 1;
                    }
                    phase = (phase + 1) % repeat;
                    for sample in frame.iter_mut() {
                        *sample = current;
                    }
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let mut st = state_cb.lock().unwrap();
                for frame in data.chunks_mut(native_channels) {
                    if phase == 0 {
                        current = st.queue.pop_front().unwrap_or(0.0);
                        st.head_frame += 1;
                    }
                    phase = (phase + 1) % repeat;
                    let value = (current.clamp(-1.0, 1.0) * 32767.0) as i16;
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                "unsupported output sample format {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
            "failed to start output stream: {}",
            e
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
}
