use serde::{Deserialize, Serialize};

/// Connection lifecycle of a live session.
///
/// disconnected -> connecting -> connected -> {error, disconnected}
///
/// Transitions are pure so the table can be tested directly; the session
/// applies them under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// A start request is honored only from the ground states; while
    /// connecting or connected it is a no-op.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Transport handshake completed.
    pub fn on_open(self) -> Self {
        match self {
            Self::Connecting => Self::Connected,
            other => other,
        }
    }

    /// Transport failure. Terminal; the caller must tear down.
    pub fn on_error(self) -> Self {
        match self {
            Self::Connecting | Self::Connected => Self::Error,
            other => other,
        }
    }

    /// Remote close. An error state is preserved so the failure stays
    /// visible until the user restarts.
    pub fn on_close(self) -> Self {
        match self {
            Self::Error => Self::Error,
            _ => Self::Disconnected,
        }
    }

    /// Explicit user stop.
    pub fn on_stop(self) -> Self {
        Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_guard() {
        assert!(ConnectionState::Disconnected.can_start());
        assert!(ConnectionState::Error.can_start());
        assert!(!ConnectionState::Connecting.can_start());
        assert!(!ConnectionState::Connected.can_start());
    }

    #[test]
    fn test_open_only_from_connecting() {
        assert_eq!(
            ConnectionState::Connecting.on_open(),
            ConnectionState::Connected
        );
        assert_eq!(
            ConnectionState::Disconnected.on_open(),
            ConnectionState::Disconnected
        );
        assert_eq!(ConnectionState::Error.on_open(), ConnectionState::Error);
    }

    #[test]
    fn test_error_from_connecting_and_connected() {
        assert_eq!(
            ConnectionState::Connecting.on_error(),
            ConnectionState::Error
        );
        assert_eq!(ConnectionState::Connected.on_error(), ConnectionState::Error);
        assert_eq!(
            ConnectionState::Disconnected.on_error(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_close_from_connected() {
        assert_eq!(
            ConnectionState::Connected.on_close(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_close_preserves_error() {
        assert_eq!(ConnectionState::Error.on_close(), ConnectionState::Error);
    }

    #[test]
    fn test_stop_from_disconnected_is_noop() {
        assert_eq!(
            ConnectionState::Disconnected.on_stop(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_stop_clears_error() {
        assert_eq!(
            ConnectionState::Error.on_stop(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_serialized_form() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
    }
}
