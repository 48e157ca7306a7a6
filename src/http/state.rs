use crate::session::LiveSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Defaults applied to every session this server creates. The API key lives
/// here, scoped to the server that owns it, and is handed to each session at
/// construction.
#[derive(Clone)]
pub struct SessionDefaults {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub api_key: String,
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub block_size: usize,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active live sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<LiveSession>>>>,

    pub defaults: Arc<SessionDefaults>,
}

impl AppState {
    pub fn new(defaults: SessionDefaults) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            defaults: Arc::new(defaults),
        }
    }
}
