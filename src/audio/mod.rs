pub mod capture;
pub mod codec;
pub mod device;
pub mod file;
pub mod playback;

pub use capture::{CaptureBackend, CaptureBackendFactory, CaptureBlock, CaptureConfig, CaptureSource};
pub use codec::AudioBuffer;
pub use device::{DeviceCaptureBackend, DeviceSink};
pub use file::{AudioFile, FileCaptureBackend};
pub use playback::{AudioSink, PlaybackConfig, PlaybackScheduler};
