// Tests for the WAV file capture backend

use kairos_live::audio::file::AudioFile;
use kairos_live::{CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource};

/// Write a mono 16kHz WAV with `samples` i16 values to a temp file.
fn write_test_wav(dir: &tempfile::TempDir, name: &str, samples: &[i16], sample_rate: u32) -> String {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path.display().to_string()
}

#[test]
fn test_audio_file_open() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = vec![100; 16000];
    let path = write_test_wav(&dir, "one-second.wav", &samples, 16000);

    let audio = AudioFile::open(&path).unwrap();
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 16000);
    assert!((audio.duration_seconds - 1.0).abs() < 1e-6);
}

#[test]
fn test_capture_samples_decimation() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = vec![1000; 48000];
    let path = write_test_wav(&dir, "high-rate.wav", &samples, 48000);

    let audio = AudioFile::open(&path).unwrap();
    let converted = audio.to_capture_samples(16000);

    // 48kHz -> 16kHz is a 3:1 decimation
    assert_eq!(converted.len(), 16000);
    assert!((converted[0] - 1000.0 / 32768.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_file_backend_delivers_blocks() {
    let dir = tempfile::tempdir().unwrap();
    // 2.5 blocks' worth of audio at the default block size
    let samples: Vec<i16> = vec![500; 4096 * 2 + 2048];
    let path = write_test_wav(&dir, "blocks.wav", &samples, 16000);

    let mut backend = CaptureBackendFactory::create(
        CaptureSource::File(path),
        CaptureConfig::default(),
    )
    .unwrap();

    let mut rx = backend.start().await.unwrap();
    assert!(backend.is_capturing());

    let mut blocks = Vec::new();
    while let Some(block) = rx.recv().await {
        blocks.push(block);
    }

    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].samples.len(), 4096);
    assert_eq!(blocks[1].samples.len(), 4096);
    assert_eq!(blocks[2].samples.len(), 2048);
    assert!(blocks.iter().all(|b| b.sample_rate == 16000));

    // Timestamps advance with the audio timeline
    assert_eq!(blocks[0].timestamp_ms, 0);
    assert!(blocks[1].timestamp_ms > blocks[0].timestamp_ms);

    backend.stop().await.unwrap();
    assert!(!backend.is_capturing());
}

#[tokio::test]
async fn test_file_backend_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = vec![0; 16000];
    let path = write_test_wav(&dir, "stop-twice.wav", &samples, 16000);

    let mut backend = CaptureBackendFactory::create(
        CaptureSource::File(path),
        CaptureConfig::default(),
    )
    .unwrap();

    let _rx = backend.start().await.unwrap();

    backend.stop().await.unwrap();
    backend.stop().await.unwrap();
    assert!(!backend.is_capturing());
}

#[tokio::test]
async fn test_file_backend_stop_before_start() {
    let mut backend = CaptureBackendFactory::create(
        CaptureSource::File("does-not-matter.wav".to_string()),
        CaptureConfig::default(),
    )
    .unwrap();

    // Never started; stop must still be safe
    backend.stop().await.unwrap();
    assert!(!backend.is_capturing());
}

#[tokio::test]
async fn test_file_backend_missing_file() {
    let mut backend = CaptureBackendFactory::create(
        CaptureSource::File("/nonexistent/missing.wav".to_string()),
        CaptureConfig::default(),
    )
    .unwrap();

    assert!(backend.start().await.is_err());
}
