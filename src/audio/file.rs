use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::capture::{CaptureBackend, CaptureBlock, CaptureConfig};
use crate::error::SessionError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Convert to normalized mono samples at the target capture rate.
    ///
    /// Stereo is averaged down to mono; higher sample rates are reduced by
    /// integer decimation. Lower rates pass through unchanged.
    pub fn to_capture_samples(&self, target_rate: u32) -> Vec<f32> {
        let mono: Vec<f32> = if self.channels == 2 {
            self.samples
                .chunks_exact(2)
                .map(|pair| (pair[0] as f32 + pair[1] as f32) / 2.0 / 32768.0)
                .collect()
        } else {
            self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
        };

        let ratio = (self.sample_rate / target_rate).max(1) as usize;
        if ratio <= 1 {
            return mono;
        }

        mono.into_iter().step_by(ratio).collect()
    }
}

/// Capture backend that replays a WAV file as real-time-paced capture blocks.
///
/// Used by tests and batch runs where no microphone is available.
pub struct FileCaptureBackend {
    path: String,
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
    capturing: bool,
}

impl FileCaptureBackend {
    pub fn new(path: String, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCaptureBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, SessionError> {
        if self.capturing {
            return Err(SessionError::DeviceUnavailable(
                "capture already running".to_string(),
            ));
        }

        let audio = AudioFile::open(&self.path).map_err(|e| {
            SessionError::DeviceUnavailable(format!("cannot open {}: {}", self.path, e))
        })?;
        let samples = audio.to_capture_samples(self.config.sample_rate);

        let (tx, rx) = mpsc::channel(100);

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);
        let sample_rate = self.config.sample_rate;
        let block_size = self.config.block_size;
        let block_duration = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        let task = tokio::spawn(async move {
            let mut sent_samples: u64 = 0;

            for chunk in samples.chunks(block_size) {
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let block = CaptureBlock {
                    samples: chunk.to_vec(),
                    sample_rate,
                    timestamp_ms: sent_samples * 1000 / sample_rate as u64,
                };
                sent_samples += chunk.len() as u64;

                if tx.send(block).await.is_err() {
                    break;
                }

                tokio::time::sleep(block_duration).await;
            }

            info!("file capture finished");
        });

        self.task = Some(task);
        self.capturing = true;
        info!(path = %self.path, "file capture started");

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}
