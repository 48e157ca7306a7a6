pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod live;
pub mod session;

pub use audio::{
    AudioBuffer, AudioSink, CaptureBackend, CaptureBackendFactory, CaptureBlock, CaptureConfig,
    CaptureSource, FileCaptureBackend, PlaybackConfig, PlaybackScheduler,
};
pub use config::Config;
pub use error::SessionError;
pub use http::{create_router, AppState, SessionDefaults};
pub use live::{LiveClient, ServerContent, ServerMessage, SessionEvent, Setup};
pub use session::{
    ConnectionState, LiveSession, SessionConfig, SessionStats, TranscriptAggregator, TranscriptTurn,
};
