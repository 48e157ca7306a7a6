// Gapless sequential playback of streamed audio chunks
//
// Chunks arrive from the network with jitter but must play back in order
// with no overlap. The scheduler keeps a single cursor on the output
// timeline: each chunk starts at max(cursor, clock) and advances the cursor
// by its duration. Arrival order is playback order.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::codec::AudioBuffer;
use crate::error::SessionError;

/// Platform audio output capability.
///
/// Anything that can report a playback clock, start a buffer at an absolute
/// clock time, and force-stop pending audio satisfies the scheduler.
pub trait AudioSink: Send {
    /// Current position of the playback clock, in seconds.
    fn now(&self) -> f64;

    /// Begin playing `buffer` at absolute clock time `at`.
    fn start_source(
        &mut self,
        source_id: u64,
        buffer: &AudioBuffer,
        at: f64,
    ) -> Result<(), SessionError>;

    /// Force-stop everything currently scheduled.
    fn stop_all(&mut self);

    /// Release the underlying output resources. Idempotent.
    fn close(&mut self);
}

/// Configuration for the playback scheduler
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Maximum scheduled lead over the playback clock, in seconds.
    /// Chunks that would start beyond this bound are dropped.
    pub max_lead_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { max_lead_secs: 10.0 }
    }
}

/// Schedules decoded chunks for ordered, gapless playback on an [`AudioSink`].
pub struct PlaybackScheduler {
    sink: Box<dyn AudioSink>,
    config: PlaybackConfig,
    /// Next available start time on the output timeline
    cursor: f64,
    /// Lazily initialized to the clock on first schedule
    started: bool,
    /// Active sources: id -> scheduled end time
    active: HashMap<u64, f64>,
    next_source_id: u64,
    scheduled: u64,
    dropped: u64,
    closed: bool,
}

impl PlaybackScheduler {
    pub fn new(sink: Box<dyn AudioSink>, config: PlaybackConfig) -> Self {
        Self {
            sink,
            config,
            cursor: 0.0,
            started: false,
            active: HashMap::new(),
            next_source_id: 0,
            scheduled: 0,
            dropped: 0,
            closed: false,
        }
    }

    /// Schedule a decoded chunk for playback.
    ///
    /// Returns the chunk's start time, or `None` if it was dropped by the
    /// lead bound.
    pub fn schedule(&mut self, buffer: &AudioBuffer) -> Result<Option<f64>, SessionError> {
        let now = self.sink.now();

        if !self.started {
            self.cursor = now;
            self.started = true;
        }

        self.prune(now);

        let start_at = self.cursor.max(now);
        if start_at - now > self.config.max_lead_secs {
            self.dropped += 1;
            warn!(
                lead_secs = start_at - now,
                dropped = self.dropped,
                "playback lagging too far behind arrival, dropping chunk"
            );
            return Ok(None);
        }

        let source_id = self.next_source_id;
        self.next_source_id += 1;

        self.sink.start_source(source_id, buffer, start_at)?;

        let end = start_at + buffer.duration_secs();
        self.active.insert(source_id, end);
        self.cursor = end;
        self.scheduled += 1;

        debug!(source_id, start_at, end, "scheduled audio chunk");

        Ok(Some(start_at))
    }

    /// Number of sources still playing or pending.
    pub fn active_sources(&mut self) -> usize {
        let now = self.sink.now();
        self.prune(now);
        self.active.len()
    }

    /// Force-stop every scheduled source and clear the active set.
    pub fn stop_all(&mut self) {
        self.sink.stop_all();
        self.active.clear();
    }

    /// Stop everything and release the sink. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop_all();
        self.sink.close();
    }

    pub fn chunks_scheduled(&self) -> u64 {
        self.scheduled
    }

    pub fn chunks_dropped(&self) -> u64 {
        self.dropped
    }

    /// Drop bookkeeping for sources that finished naturally.
    fn prune(&mut self, now: f64) {
        self.active.retain(|_, end| *end > now);
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.close();
    }
}
