use anyhow::Result;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// A fixed-size block of captured microphone audio (mono f32 samples).
#[derive(Debug, Clone)]
pub struct CaptureBlock {
    /// Normalized samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate (the live endpoint expects 16kHz input)
    pub sample_rate: u32,
    /// Channel count delivered to the consumer (1 = mono)
    pub channels: u16,
    /// Samples per block (power of two)
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz mono input
            channels: 1,
            block_size: 4096,
        }
    }
}

/// Microphone capture backend trait
///
/// Implementations:
/// - Device: default input device via cpal (all desktop platforms)
/// - File: replay a WAV file as paced capture blocks (testing/batch)
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive capture blocks. The
    /// channel is bounded; if the consumer lags, blocks are dropped at the
    /// producer rather than buffered without bound.
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, SessionError>;

    /// Stop capturing. Idempotent; safe to call on a backend that never
    /// started or already stopped.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Default microphone device
    Microphone,
    /// WAV file input (testing/batch)
    File(String),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(
        source: CaptureSource,
        config: CaptureConfig,
    ) -> Result<Box<dyn CaptureBackend>, SessionError> {
        match source {
            CaptureSource::Microphone => {
                let backend = super::device::DeviceCaptureBackend::new(config);
                Ok(Box::new(backend))
            }
            CaptureSource::File(path) => {
                let backend = super::file::FileCaptureBackend::new(path, config);
                Ok(Box::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.block_size, 4096);
        assert!(config.block_size.is_power_of_two());
    }

    #[test]
    fn test_capture_block_duration() {
        let block = CaptureBlock {
            samples: vec![0.0; 1600],
            sample_rate: 16000,
            timestamp_ms: 0,
        };
        let duration_secs = block.samples.len() as f64 / block.sample_rate as f64;
        assert!((duration_secs - 0.1).abs() < 1e-9);
    }
}
