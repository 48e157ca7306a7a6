use crate::audio::{CaptureConfig, CaptureSource, PlaybackConfig};
use crate::live::messages::{
    Content, GenerationConfig, PrebuiltVoiceConfig, Setup, SpeechConfig, TranscriptionConfig,
    VoiceConfig,
};

pub const DEFAULT_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Zephyr";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a friendly, empathetic, and wise spiritual companion.";

/// Configuration for a live conversation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Websocket URL of the live endpoint
    pub endpoint: String,

    /// API key, passed as a query parameter on connect
    pub api_key: String,

    /// Model to converse with
    pub model: String,

    /// Prebuilt voice for model speech
    pub voice: String,

    /// Persona instruction sent with setup
    pub system_instruction: String,

    /// Where capture blocks come from
    pub capture_source: CaptureSource,

    /// Capture format (16kHz mono blocks)
    pub capture: CaptureConfig,

    /// Sample rate of model speech (fixed by the endpoint)
    pub playback_sample_rate: u32,

    /// Playback scheduling policy
    pub playback: PlaybackConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("live-{}", uuid::Uuid::new_v4()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            capture_source: CaptureSource::Microphone,
            capture: CaptureConfig::default(),
            playback_sample_rate: 24000,
            playback: PlaybackConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Build the setup message for this session: audio responses in the
    /// configured voice, transcription enabled for both directions.
    pub fn setup_message(&self) -> Setup {
        Setup {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                }),
            },
            system_instruction: Some(Content::from_text(self.system_instruction.clone())),
            input_audio_transcription: Some(TranscriptionConfig::default()),
            output_audio_transcription: Some(TranscriptionConfig::default()),
        }
    }
}
