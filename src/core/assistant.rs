//! Conversational assistant: chat transcript, streamed replies and speech.
//!
//! Independent of the generation workflow and never charged.

use crate::{
    core::audio::{Clip, PlaybackTimeline},
    errors::{Error, Result},
    genai::{ChatTurn, GenAiClient, SPEECH_SAMPLE_RATE},
};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Turns kept in history; older ones are dropped first.
pub const MAX_HISTORY_TURNS: usize = 40;

/// Chat transcript with at most one uncommitted assistant response
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
    partial: Option<String>,
}

impl Conversation {
    /// Empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the user's message and opens an empty partial response.
    pub fn begin_response(&mut self, user_message: &str) {
        self.partial = None;
        self.push(ChatTurn::user(user_message.trim()));
        self.partial = Some(String::new());
    }

    /// Appends streamed text to the partial response.
    pub fn append_token(&mut self, token: &str) {
        if let Some(partial) = self.partial.as_mut() {
            partial.push_str(token);
        }
    }

    /// Turns the partial response into a committed turn.
    pub fn commit_response(&mut self) -> Option<&str> {
        let text = self.partial.take()?;
        self.push(ChatTurn::model(text));
        self.turns.last().map(|t| t.text.as_str())
    }

    /// Drops the partial response, and the user turn that asked for it.
    pub fn discard_partial(&mut self) {
        if self.partial.take().is_some()
            && self
                .turns
                .last()
                .is_some_and(|t| t.role == crate::genai::ChatRole::User)
        {
            self.turns.pop();
        }
    }

    /// Partial response, if one is streaming.
    #[must_use]
    pub fn partial(&self) -> Option<&str> {
        self.partial.as_deref()
    }

    /// Committed turns.
    #[must_use]
    pub fn history(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.partial = None;
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        if self.turns.len() > MAX_HISTORY_TURNS {
            let excess = self.turns.len() - MAX_HISTORY_TURNS;
            self.turns.drain(..excess);
        }
    }
}

/// Streams a reply, handing each token to `on_token`, and returns the full text.
///
/// # Errors
/// The first stream error ends the reply; tokens already delivered are not retracted.
#[instrument(skip_all, fields(history = history.len()))]
pub async fn stream_reply<F>(
    genai: &dyn GenAiClient,
    history: &[ChatTurn],
    message: &str,
    mut on_token: F,
) -> Result<String>
where
    F: FnMut(&str) + Send,
{
    let mut stream = genai.stream_chat(history, message).await?;
    let mut full = String::new();
    while let Some(token) = stream.next().await {
        let token = token.inspect_err(|e| warn!("Chat stream failed: {e}"))?;
        full.push_str(&token);
        on_token(&token);
    }
    info!(chars = full.len(), "Chat reply complete");
    Ok(full)
}

/// Synthesizes `text` into a mono clip at [`SPEECH_SAMPLE_RATE`].
#[instrument(skip_all, fields(chars = text.len()))]
pub async fn synthesize(genai: &dyn GenAiClient, text: &str) -> Result<Clip> {
    let pcm = genai.synthesize_speech(text).await?;
    let clip = Clip::from_pcm16le(&pcm, SPEECH_SAMPLE_RATE);
    if clip.samples.is_empty() {
        return Err(Error::Audio {
            message: "the speech service returned no audio".to_string(),
        });
    }
    Ok(clip)
}

/// Synthesizes `text` and schedules it on the timeline.
///
/// Returns the clip and its scheduled start. Callers sharing a timeline
/// should [`synthesize`] first and schedule under their own lock.
pub async fn speak(
    genai: &dyn GenAiClient,
    text: &str,
    timeline: &mut PlaybackTimeline,
    now: Duration,
) -> Result<(Clip, Duration)> {
    let clip = synthesize(genai, text).await?;
    let start = timeline.schedule(clip.clone(), now);
    Ok((clip, start))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{errors::Error, genai::ChatRole, test_utils::FakeGenAi};

    #[test]
    fn test_commit_and_discard() {
        let mut conversation = Conversation::new();
        conversation.begin_response("Which wine with risotto?");
        conversation.append_token("A crisp ");
        conversation.append_token("Soave.");
        assert_eq!(conversation.partial(), Some("A crisp Soave."));
        assert_eq!(conversation.commit_response(), Some("A crisp Soave."));
        assert_eq!(conversation.history().len(), 2);
        assert_eq!(conversation.history()[1].role, ChatRole::Model);

        conversation.begin_response("And dessert?");
        conversation.append_token("Moscato");
        conversation.discard_partial();
        assert_eq!(conversation.history().len(), 2);
        assert!(conversation.partial().is_none());
        assert!(conversation.commit_response().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut conversation = Conversation::new();
        for i in 0..MAX_HISTORY_TURNS {
            conversation.begin_response(&format!("q{i}"));
            conversation.append_token("a");
            conversation.commit_response();
        }
        assert_eq!(conversation.history().len(), MAX_HISTORY_TURNS);
        conversation.clear();
        assert!(conversation.history().is_empty());
    }

    #[tokio::test]
    async fn test_stream_reply_delivers_tokens_in_order() -> Result<()> {
        let genai = FakeGenAi::new();
        let mut seen = Vec::new();
        let full = stream_reply(&genai, &[], "hello chef", |t| seen.push(t.to_string())).await?;
        assert_eq!(seen.concat(), full);
        assert!(seen.len() > 1);
        assert!(full.contains("hello chef"));
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_reply_failure() -> Result<()> {
        let genai = FakeGenAi::failing();
        let result = stream_reply(&genai, &[], "hi", |_| {}).await;
        assert!(matches!(result, Err(Error::GenAi(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_speak_schedules_back_to_back() -> Result<()> {
        let genai = FakeGenAi::new();
        let mut timeline = PlaybackTimeline::new();

        let (first, a) = speak(&genai, "one", &mut timeline, Duration::ZERO).await?;
        let (_, b) = speak(&genai, "two", &mut timeline, Duration::ZERO).await?;
        assert_eq!(a, Duration::ZERO);
        assert_eq!(b, first.duration());
        assert_eq!(first.sample_rate, SPEECH_SAMPLE_RATE);
        Ok(())
    }
}
