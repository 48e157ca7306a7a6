use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::state::ConnectionState;
use super::stats::SessionStats;
use super::transcript::{TranscriptAggregator, TranscriptTurn};
use crate::audio::codec;
use crate::audio::{CaptureBackend, CaptureBackendFactory, DeviceSink, PlaybackScheduler};
use crate::error::SessionError;
use crate::live::client::{LiveClient, SessionEvent};

/// Resources that must be released exactly once per session lifecycle,
/// whichever path triggers it (user stop, remote close, transport error).
#[derive(Clone)]
struct SharedResources {
    capture: Arc<Mutex<Option<Box<dyn CaptureBackend>>>>,
    scheduler: Arc<Mutex<Option<PlaybackScheduler>>>,
    client: Arc<Mutex<Option<LiveClient>>>,
    torn_down: Arc<AtomicBool>,
}

impl SharedResources {
    fn new() -> Self {
        Self {
            capture: Arc::new(Mutex::new(None)),
            scheduler: Arc::new(Mutex::new(None)),
            client: Arc::new(Mutex::new(None)),
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Release the microphone, the playback sink with everything scheduled
    /// on it, and the transport. Guarded so repeated calls are no-ops.
    ///
    /// Everything is taken out of the shared slots before any release so a
    /// cancelled teardown still ends in the resources' Drop impls.
    async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("releasing live session resources");

        let capture = self.capture.lock().await.take();
        let scheduler = self.scheduler.lock().await.take();
        let client = self.client.lock().await.take();

        if let Some(mut backend) = capture {
            if let Err(e) = backend.stop().await {
                error!(error = %e, "failed to stop capture backend");
            }
        }

        if let Some(mut scheduler) = scheduler {
            scheduler.stop_all();
            scheduler.close();
        }

        if let Some(client) = client {
            client.close();
        }
    }
}

/// A live voice conversation: microphone capture streaming to the remote
/// endpoint, model audio played back in order, transcripts accumulated per
/// turn.
pub struct LiveSession {
    config: SessionConfig,

    /// Connection lifecycle state
    state: Arc<Mutex<ConnectionState>>,

    /// Per-turn transcript accumulation and history
    transcript: Arc<Mutex<TranscriptAggregator>>,

    resources: SharedResources,

    /// When the session was created
    started_at: chrono::DateTime<chrono::Utc>,

    blocks_sent: Arc<AtomicUsize>,
    chunks_scheduled: Arc<AtomicUsize>,
    chunks_dropped: Arc<AtomicUsize>,
    decode_failures: Arc<AtomicUsize>,

    /// Handle for the inbound event dispatch task
    dispatch_handle: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Handle for the capture pump task
    pump_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LiveSession {
    pub fn new(config: SessionConfig) -> Self {
        info!("Creating live session: {}", config.session_id);

        Self {
            config,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            transcript: Arc::new(Mutex::new(TranscriptAggregator::new())),
            resources: SharedResources::new(),
            started_at: Utc::now(),
            blocks_sent: Arc::new(AtomicUsize::new(0)),
            chunks_scheduled: Arc::new(AtomicUsize::new(0)),
            chunks_dropped: Arc::new(AtomicUsize::new(0)),
            decode_failures: Arc::new(AtomicUsize::new(0)),
            dispatch_handle: Arc::new(Mutex::new(None)),
            pump_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Start the conversation.
    ///
    /// No-op while already connecting or connected. On any startup failure
    /// the session lands in the error state with all resources released.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.can_start() {
                warn!("session already connecting or connected");
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        info!("Starting live session: {}", self.config.session_id);
        self.resources.torn_down.store(false, Ordering::SeqCst);

        match self.start_inner().await {
            Ok(()) => {
                if self.resources.torn_down.load(Ordering::SeqCst) {
                    // A concurrent stop raced the startup sequence; release
                    // whatever start managed to install after its teardown.
                    self.resources.torn_down.store(false, Ordering::SeqCst);
                    self.resources.teardown().await;
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to start live session");
                *self.state.lock().await = ConnectionState::Error;
                self.resources.teardown().await;
                Err(e)
            }
        }
    }

    async fn start_inner(&self) -> Result<()> {
        // Microphone first: without input there is nothing to stream.
        let mut backend = CaptureBackendFactory::create(
            self.config.capture_source.clone(),
            self.config.capture.clone(),
        )
        .context("failed to create capture backend")?;

        let capture_rx = backend
            .start()
            .await
            .context("failed to acquire capture device")?;
        *self.resources.capture.lock().await = Some(backend);

        let sink = DeviceSink::open(self.config.playback_sample_rate)
            .await
            .context("failed to open playback sink")?;
        *self.resources.scheduler.lock().await = Some(PlaybackScheduler::new(
            Box::new(sink),
            self.config.playback.clone(),
        ));

        let (client, mut events) = LiveClient::connect(
            &self.config.endpoint,
            &self.config.api_key,
            self.config.setup_message(),
        )
        .await
        .context("failed to connect to live endpoint")?;
        *self.resources.client.lock().await = Some(client.clone());

        // The pump starts streaming only once the server has opened.
        let (opened_tx, opened_rx) = oneshot::channel::<()>();

        // Dispatch task: sole consumer of the ordered event channel.
        let state = Arc::clone(&self.state);
        let transcript = Arc::clone(&self.transcript);
        let resources = self.resources.clone();
        let chunks_scheduled = Arc::clone(&self.chunks_scheduled);
        let chunks_dropped = Arc::clone(&self.chunks_dropped);
        let decode_failures = Arc::clone(&self.decode_failures);
        let playback_rate = self.config.playback_sample_rate;

        let dispatch_task = tokio::spawn(async move {
            info!("event dispatch task started");
            let mut opened_tx = Some(opened_tx);

            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Opened => {
                        {
                            let mut st = state.lock().await;
                            *st = st.on_open();
                        }
                        if let Some(tx) = opened_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                    SessionEvent::Message(message) => {
                        let Some(content) = message.server_content else {
                            continue;
                        };

                        // Transcript fragments apply before the completion
                        // flag so a turn's last fragment lands inside it.
                        transcript.lock().await.apply_content(&content);

                        if let Some(data) = content.audio_data() {
                            let decoded = codec::decode(data)
                                .and_then(|bytes| codec::decode_audio(&bytes, playback_rate, 1));

                            match decoded {
                                Ok(buffer) => {
                                    let mut guard = resources.scheduler.lock().await;
                                    if let Some(scheduler) = guard.as_mut() {
                                        match scheduler.schedule(&buffer) {
                                            Ok(Some(_)) => {
                                                chunks_scheduled.fetch_add(1, Ordering::SeqCst);
                                            }
                                            Ok(None) => {
                                                chunks_dropped.fetch_add(1, Ordering::SeqCst);
                                            }
                                            Err(e) => {
                                                warn!(error = %e, "failed to schedule audio chunk");
                                            }
                                        }
                                    }
                                }
                                Err(e) => {
                                    // One bad chunk never ends the session.
                                    decode_failures.fetch_add(1, Ordering::SeqCst);
                                    warn!(error = %e, "dropping malformed audio chunk");
                                }
                            }
                        }
                    }
                    SessionEvent::Error(message) => {
                        error!(error = %message, "live transport failure, tearing down");
                        {
                            let mut st = state.lock().await;
                            *st = st.on_error();
                        }
                        resources.teardown().await;
                        break;
                    }
                    SessionEvent::Closed => {
                        info!("live connection closed");
                        {
                            let mut st = state.lock().await;
                            *st = st.on_close();
                        }
                        resources.teardown().await;
                        break;
                    }
                }
            }

            info!("event dispatch task stopped");
        });

        {
            let mut handle = self.dispatch_handle.lock().await;
            *handle = Some(dispatch_task);
        }

        // Pump task: capture blocks -> PCM16 -> transport, in capture order.
        let blocks_sent = Arc::clone(&self.blocks_sent);
        let mut capture_rx = capture_rx;

        let pump_task = tokio::spawn(async move {
            if opened_rx.await.is_err() {
                // The session ended before the server opened.
                return;
            }

            info!("capture pump started");

            while let Some(block) = capture_rx.recv().await {
                let pcm = codec::floats_to_pcm16(&block.samples);

                match client.send_realtime_audio(&pcm, block.sample_rate) {
                    Ok(()) => {
                        blocks_sent.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(SessionError::NotConnected) => break,
                    Err(e) => {
                        warn!(error = %e, "failed to queue capture block");
                    }
                }
            }

            info!("capture pump stopped");
        });

        {
            let mut handle = self.pump_handle.lock().await;
            *handle = Some(pump_task);
        }

        Ok(())
    }

    /// Stop the conversation and release everything.
    ///
    /// Immediate and unconditional: in-flight sends and decodes are not
    /// awaited. Safe to call on an inactive session.
    pub async fn stop(&self) -> SessionStats {
        {
            let mut state = self.state.lock().await;
            if *state == ConnectionState::Disconnected {
                warn!("session not active");
                return self.get_stats().await;
            }
            *state = state.on_stop();
        }

        info!("Stopping live session: {}", self.config.session_id);

        self.resources.teardown().await;

        // Stop is unconditional: the tasks are cancelled rather than waited
        // out, so a dead connection cannot wedge the caller.
        {
            let mut handle = self.dispatch_handle.lock().await;
            if let Some(task) = handle.take() {
                task.abort();
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!("dispatch task panicked: {}", e);
                    }
                }
            }
        }

        {
            let mut handle = self.pump_handle.lock().await;
            if let Some(task) = handle.take() {
                task.abort();
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!("pump task panicked: {}", e);
                    }
                }
            }
        }

        info!("Live session stopped: {}", self.config.session_id);

        self.get_stats().await
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Snapshot of session statistics.
    pub async fn get_stats(&self) -> SessionStats {
        let state = *self.state.lock().await;
        let turns_completed = self.transcript.lock().await.turns_completed();
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            state,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            blocks_sent: self.blocks_sent.load(Ordering::SeqCst),
            chunks_scheduled: self.chunks_scheduled.load(Ordering::SeqCst),
            chunks_dropped: self.chunks_dropped.load(Ordering::SeqCst),
            decode_failures: self.decode_failures.load(Ordering::SeqCst),
            turns_completed,
        }
    }

    /// Finalized conversation turns so far.
    pub async fn get_transcript(&self) -> Vec<TranscriptTurn> {
        self.transcript.lock().await.history().to_vec()
    }
}
