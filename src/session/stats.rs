use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::ConnectionState;

/// Snapshot of a live session's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current connection lifecycle state
    pub state: ConnectionState,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Total lifetime in seconds
    pub duration_secs: f64,

    /// Capture blocks sent to the endpoint
    pub blocks_sent: usize,

    /// Inbound audio chunks scheduled for playback
    pub chunks_scheduled: usize,

    /// Inbound audio chunks dropped by the playback lead bound
    pub chunks_dropped: usize,

    /// Inbound audio chunks that failed to decode
    pub decode_failures: usize,

    /// Finalized conversation turns
    pub turns_completed: usize,
}
