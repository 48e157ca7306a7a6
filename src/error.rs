use thiserror::Error;

/// Errors surfaced by the live session pipeline.
///
/// Per-chunk decode failures are handled (and swallowed) at the component
/// boundary; everything else is terminal for the session that hit it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone access was denied by the platform.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable capture or playback device.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Audio was sent before the transport finished its handshake, or after
    /// it closed. Caller-side misuse, not a network condition.
    #[error("transport not connected")]
    NotConnected,

    /// Malformed transport encoding or PCM payload.
    #[error("malformed audio payload: {0}")]
    Decode(String),

    /// Connection-level failure. Always terminal for the session.
    #[error("transport failure: {0}")]
    Transport(String),
}
