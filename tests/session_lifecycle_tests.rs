// Lifecycle tests for the live session and playback teardown paths
//
// These exercise the parts of the lifecycle that don't need a device or a
// network: guards on inactive sessions, repeated teardown, and the
// scheduler's stop/close discipline through the public sink trait.

use std::sync::{Arc, Mutex};

use kairos_live::audio::codec::AudioBuffer;
use kairos_live::{
    AudioSink, ConnectionState, LiveSession, PlaybackConfig, PlaybackScheduler, SessionConfig,
    SessionError,
};

#[tokio::test]
async fn test_new_session_is_disconnected() {
    let session = LiveSession::new(SessionConfig::default());
    assert_eq!(session.state().await, ConnectionState::Disconnected);

    let stats = session.get_stats().await;
    assert_eq!(stats.state, ConnectionState::Disconnected);
    assert_eq!(stats.blocks_sent, 0);
    assert_eq!(stats.chunks_scheduled, 0);
    assert_eq!(stats.turns_completed, 0);
}

#[tokio::test]
async fn test_stop_on_inactive_session_is_noop() {
    let session = LiveSession::new(SessionConfig::default());

    let stats = session.stop().await;
    assert_eq!(stats.state, ConnectionState::Disconnected);

    // A second stop (late error callback path) must also be harmless
    let stats = session.stop().await;
    assert_eq!(stats.state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_transcript_empty_on_fresh_session() {
    let session = LiveSession::new(SessionConfig::default());
    assert!(session.get_transcript().await.is_empty());
}

/// Sink that counts stop/close calls; used to verify teardown discipline.
struct CountingSink {
    stop_all_calls: Arc<Mutex<usize>>,
    close_calls: Arc<Mutex<usize>>,
}

impl AudioSink for CountingSink {
    fn now(&self) -> f64 {
        0.0
    }

    fn start_source(
        &mut self,
        _source_id: u64,
        _buffer: &AudioBuffer,
        _at: f64,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    fn stop_all(&mut self) {
        *self.stop_all_calls.lock().unwrap() += 1;
    }

    fn close(&mut self) {
        *self.close_calls.lock().unwrap() += 1;
    }
}

fn chunk(duration_secs: f64) -> AudioBuffer {
    AudioBuffer {
        samples: vec![0.0; (duration_secs * 24000.0) as usize],
        sample_rate: 24000,
        channels: 1,
    }
}

#[test]
fn test_scheduler_teardown_releases_once() {
    let stop_all_calls = Arc::new(Mutex::new(0));
    let close_calls = Arc::new(Mutex::new(0));

    let sink = CountingSink {
        stop_all_calls: Arc::clone(&stop_all_calls),
        close_calls: Arc::clone(&close_calls),
    };

    let mut scheduler = PlaybackScheduler::new(Box::new(sink), PlaybackConfig::default());
    scheduler.schedule(&chunk(0.5)).unwrap();
    scheduler.schedule(&chunk(0.5)).unwrap();
    assert_eq!(scheduler.active_sources(), 2);

    // Teardown path: stop everything, then close; closing again (the late
    // error callback path) must not double-release the sink.
    scheduler.close();
    scheduler.close();

    assert_eq!(scheduler.active_sources(), 0);
    assert_eq!(*close_calls.lock().unwrap(), 1);
    assert!(*stop_all_calls.lock().unwrap() >= 1);
}

#[test]
fn test_decode_failure_does_not_block_later_chunks() {
    use kairos_live::audio::codec::{decode, decode_audio};

    // The dispatch path: decode each inbound payload, skip failures, keep
    // scheduling the rest.
    let sink = CountingSink {
        stop_all_calls: Arc::new(Mutex::new(0)),
        close_calls: Arc::new(Mutex::new(0)),
    };
    let mut scheduler = PlaybackScheduler::new(Box::new(sink), PlaybackConfig::default());

    let payloads = [
        kairos_live::audio::codec::encode(&[0u8; 480]),
        "!!not-base64!!".to_string(),
        kairos_live::audio::codec::encode(&[0u8; 481]), // partial frame
        kairos_live::audio::codec::encode(&[0u8; 480]),
    ];

    let mut scheduled = 0;
    let mut failures = 0;
    for payload in &payloads {
        match decode(payload).and_then(|bytes| decode_audio(&bytes, 24000, 1)) {
            Ok(buffer) => {
                scheduler.schedule(&buffer).unwrap();
                scheduled += 1;
            }
            Err(_) => failures += 1,
        }
    }

    assert_eq!(scheduled, 2);
    assert_eq!(failures, 2);
    assert_eq!(scheduler.chunks_scheduled(), 2);
}
