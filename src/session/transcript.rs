use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::live::messages::ServerContent;

/// One finalized user/model exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// What the user said
    pub user_text: String,

    /// What the model answered
    pub model_text: String,

    /// When the turn-completion event arrived
    pub completed_at: DateTime<Utc>,
}

/// Accumulates partial transcript fragments into finalized turns.
///
/// Fragments are concatenated, never replaced. A turn-completion event moves
/// the accumulated pair into history and resets both accumulators.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    user_buf: String,
    model_buf: String,
    history: Vec<TranscriptTurn>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound content event.
    ///
    /// Fragments are applied before the completion flag is checked so the
    /// final fragment of a turn lands inside that turn.
    pub fn apply_content(&mut self, content: &ServerContent) {
        if let Some(fragment) = &content.input_transcription {
            self.push_user(&fragment.text);
        }
        if let Some(fragment) = &content.output_transcription {
            self.push_model(&fragment.text);
        }
        if content.turn_complete {
            self.complete_turn();
        }
    }

    pub fn push_user(&mut self, fragment: &str) {
        self.user_buf.push_str(fragment);
    }

    pub fn push_model(&mut self, fragment: &str) {
        self.model_buf.push_str(fragment);
    }

    /// Finalize the current turn and reset the accumulators.
    pub fn complete_turn(&mut self) {
        let turn = TranscriptTurn {
            user_text: std::mem::take(&mut self.user_buf),
            model_text: std::mem::take(&mut self.model_buf),
            completed_at: Utc::now(),
        };
        self.history.push(turn);
    }

    /// Finalized turns, oldest first.
    pub fn history(&self) -> &[TranscriptTurn] {
        &self.history
    }

    pub fn turns_completed(&self) -> usize {
        self.history.len()
    }

    /// In-progress accumulators for the current turn.
    pub fn partial(&self) -> (&str, &str) {
        (&self.user_buf, &self.model_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::messages::Transcription;

    fn user_fragment(text: &str) -> ServerContent {
        ServerContent {
            input_transcription: Some(Transcription { text: text.to_string() }),
            ..Default::default()
        }
    }

    fn model_fragment(text: &str) -> ServerContent {
        ServerContent {
            output_transcription: Some(Transcription { text: text.to_string() }),
            ..Default::default()
        }
    }

    fn turn_complete() -> ServerContent {
        ServerContent {
            turn_complete: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fragments_concatenate() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_content(&user_fragment("Hel"));
        aggregator.apply_content(&user_fragment("lo"));
        aggregator.apply_content(&model_fragment("Hi"));

        assert_eq!(aggregator.partial(), ("Hello", "Hi"));
        assert!(aggregator.history().is_empty());
    }

    #[test]
    fn test_finalization_resets_accumulators() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_content(&user_fragment("Hel"));
        aggregator.apply_content(&user_fragment("lo"));
        aggregator.apply_content(&model_fragment("Hi"));
        aggregator.apply_content(&turn_complete());

        assert_eq!(aggregator.history().len(), 1);
        assert_eq!(aggregator.history()[0].user_text, "Hello");
        assert_eq!(aggregator.history()[0].model_text, "Hi");
        assert_eq!(aggregator.partial(), ("", ""));
    }

    #[test]
    fn test_final_fragment_included_in_same_event() {
        // Fragment and completion flag arriving in one event: the fragment
        // must land inside the finalized turn, not the next one.
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_content(&user_fragment("Amen"));

        let closing = ServerContent {
            output_transcription: Some(Transcription {
                text: "Peace be with you.".to_string(),
            }),
            turn_complete: true,
            ..Default::default()
        };
        aggregator.apply_content(&closing);

        assert_eq!(aggregator.history().len(), 1);
        assert_eq!(aggregator.history()[0].model_text, "Peace be with you.");
        assert_eq!(aggregator.partial(), ("", ""));
    }

    #[test]
    fn test_turns_accumulate_in_order() {
        let mut aggregator = TranscriptAggregator::new();

        aggregator.apply_content(&user_fragment("first"));
        aggregator.apply_content(&turn_complete());
        aggregator.apply_content(&user_fragment("second"));
        aggregator.apply_content(&turn_complete());

        assert_eq!(aggregator.turns_completed(), 2);
        assert_eq!(aggregator.history()[0].user_text, "first");
        assert_eq!(aggregator.history()[1].user_text, "second");
    }

    #[test]
    fn test_empty_turn_is_recorded() {
        // A completion with no fragments still closes a (blank) turn.
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_content(&turn_complete());

        assert_eq!(aggregator.turns_completed(), 1);
        assert_eq!(aggregator.history()[0].user_text, "");
    }
}
