//! Realtime voice session with an explicit lifecycle.
//!
//! `Idle → Connecting → Open → Closed`. Any transport error, timeout or
//! remote close moves the session to `Closed` and throws away transcripts
//! that were not committed by a completed turn.

use crate::{
    core::audio::{Clip, PlaybackTimeline, encode_pcm16le},
    errors::{Error, Result},
    genai::live::{
        ClientMessage, INPUT_SAMPLE_RATE, LiveConnector, LiveEvent, LiveTransport,
        OUTPUT_SAMPLE_RATE,
    },
};
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info, warn};

/// Samples per outgoing audio message (100 ms at 16 kHz)
pub const CHUNK_SAMPLES: usize = INPUT_SAMPLE_RATE as usize / 10;

/// Lifecycle of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// Not connected yet
    Idle,
    /// Handshake in progress
    Connecting,
    /// Audio may flow
    Open,
    /// Finished, cannot be reopened
    Closed,
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Receives assistant speech as it arrives.
pub trait AudioSink: Send {
    /// Plays or stores one clip.
    fn play(&mut self, clip: Clip);
}

/// Sink that lays clips back to back on a timeline.
#[derive(Debug, Default)]
pub struct TimelineSink {
    /// Where the clips end up
    pub timeline: PlaybackTimeline,
}

impl AudioSink for TimelineSink {
    fn play(&mut self, clip: Clip) {
        let now = self.timeline.cursor();
        self.timeline.schedule(clip, now);
    }
}

/// Transcript of one completed exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTranscript {
    /// What the user said
    pub user: String,
    /// What the assistant said
    pub assistant: String,
}

/// A realtime voice session.
pub struct LiveSession<S: AudioSink> {
    state: LiveState,
    transport: Option<Box<dyn LiveTransport>>,
    sink: S,
    queue: VecDeque<LiveEvent>,
    partial: LiveTranscript,
    committed: Vec<LiveTranscript>,
}

impl<S: AudioSink> LiveSession<S> {
    /// Idle session that will play into `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            state: LiveState::Idle,
            transport: None,
            sink,
            queue: VecDeque::new(),
            partial: LiveTranscript::default(),
            committed: Vec::new(),
        }
    }

    /// Current state.
    pub const fn state(&self) -> LiveState {
        self.state
    }

    /// Completed exchanges, oldest first.
    pub fn transcripts(&self) -> &[LiveTranscript] {
        &self.committed
    }

    /// Uncommitted transcript of the exchange in progress.
    pub const fn partial(&self) -> &LiveTranscript {
        &self.partial
    }

    /// The audio sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the session and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_state(&self, expected: LiveState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::Live {
                message: format!("cannot {action} while the session is {}", self.state),
            })
        }
    }

    async fn teardown(&mut self) {
        self.queue.clear();
        self.partial = LiveTranscript::default();
        if let Some(mut transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            debug!("Ignoring error while closing live transport: {e}");
        }
        self.state = LiveState::Closed;
    }

    async fn fail(&mut self, error: Error) -> Error {
        warn!("Live session failed: {error}");
        self.teardown().await;
        error
    }

    /// Connects through `connector`.
    pub async fn open(&mut self, connector: &dyn LiveConnector) -> Result<()> {
        self.ensure_state(LiveState::Idle, "open")?;
        self.state = LiveState::Connecting;
        match connector.connect().await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = LiveState::Open;
                info!("Live session open");
                Ok(())
            }
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<()> {
        self.ensure_state(LiveState::Open, "send audio")?;
        let Some(transport) = self.transport.as_mut() else {
            return Err(self
                .fail(Error::Live {
                    message: "transport missing".to_string(),
                })
                .await);
        };
        if let Err(e) = transport.send(message).await {
            return Err(self.fail(e.into()).await);
        }
        Ok(())
    }

    /// Sends 16 kHz mono samples in [`CHUNK_SAMPLES`] messages.
    pub async fn send_audio(&mut self, samples: &[i16]) -> Result<()> {
        for chunk in samples.chunks(CHUNK_SAMPLES) {
            self.send(ClientMessage::Audio(encode_pcm16le(chunk)))
                .await?;
        }
        Ok(())
    }

    /// Tells the service the user stopped talking.
    pub async fn end_audio(&mut self) -> Result<()> {
        self.send(ClientMessage::AudioEnd).await
    }

    fn apply(&mut self, event: &LiveEvent) {
        match event {
            LiveEvent::Audio(pcm) => self.sink.play(Clip::from_pcm16le(pcm, OUTPUT_SAMPLE_RATE)),
            LiveEvent::InputTranscript(text) => self.partial.user.push_str(text),
            LiveEvent::OutputTranscript(text) => self.partial.assistant.push_str(text),
            LiveEvent::Interrupted => self.partial.assistant.clear(),
            LiveEvent::TurnComplete => {
                let turn = std::mem::take(&mut self.partial);
                self.committed.push(LiveTranscript {
                    user: turn.user.trim().to_string(),
                    assistant: turn.assistant.trim().to_string(),
                });
            }
        }
    }

    /// Waits for the next event; `None` once the service has closed the session.
    pub async fn next_event(&mut self) -> Result<Option<LiveEvent>> {
        self.ensure_state(LiveState::Open, "receive")?;
        loop {
            if let Some(event) = self.queue.pop_front() {
                self.apply(&event);
                return Ok(Some(event));
            }
            let Some(transport) = self.transport.as_mut() else {
                return Ok(None);
            };
            match transport.recv().await {
                Ok(Some(events)) => self.queue.extend(events),
                Ok(None) => {
                    info!("Live session closed by the service");
                    self.teardown().await;
                    return Ok(None);
                }
                Err(e) => return Err(self.fail(e.into()).await),
            }
        }
    }

    /// Reads events until the assistant completes its turn.
    ///
    /// # Errors
    /// `Live` on timeout or when the service hangs up mid-turn; the session is
    /// closed in both cases.
    pub async fn run_turn(&mut self, timeout: Duration) -> Result<LiveTranscript> {
        let outcome = tokio::time::timeout(timeout, async {
            while let Some(event) = self.next_event().await? {
                if event == LiveEvent::TurnComplete {
                    return Ok(Some(()));
                }
            }
            Ok::<_, Error>(None)
        })
        .await;

        match outcome {
            Ok(Ok(Some(()))) => Ok(self.committed.last().cloned().unwrap_or_default()),
            Ok(Ok(None)) => Err(Error::Live {
                message: "the voice session ended before the assistant answered".to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self
                .fail(Error::Live {
                    message: format!("no answer within {}s", timeout.as_secs()),
                })
                .await),
        }
    }

    /// Closes the session and discards uncommitted transcripts.
    pub async fn close(&mut self) {
        if self.state != LiveState::Closed {
            info!("Closing live session");
        }
        self.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{FakeLiveConnector, FakeLiveScript};

    #[tokio::test]
    async fn test_full_turn() -> Result<()> {
        let script = FakeLiveScript::answering(vec![
            vec![LiveEvent::InputTranscript("what wine".to_string())],
            vec![
                LiveEvent::Audio(encode_pcm16le(&[1; 2_400])),
                LiveEvent::OutputTranscript("A Barolo ".to_string()),
            ],
            vec![
                LiveEvent::Audio(encode_pcm16le(&[2; 2_400])),
                LiveEvent::OutputTranscript("pairs well.".to_string()),
                LiveEvent::TurnComplete,
            ],
        ]);
        let connector = FakeLiveConnector::new(script.clone());

        let mut session = LiveSession::new(TimelineSink::default());
        assert_eq!(session.state(), LiveState::Idle);
        session.open(&connector).await?;
        assert_eq!(session.state(), LiveState::Open);

        session.send_audio(&vec![0; CHUNK_SAMPLES * 2 + 10]).await?;
        session.end_audio().await?;
        assert_eq!(script.sent_audio_chunks(), 3);
        assert!(script.audio_ended());

        let transcript = session.run_turn(Duration::from_secs(5)).await?;
        assert_eq!(transcript.user, "what wine");
        assert_eq!(transcript.assistant, "A Barolo pairs well.");

        let timeline = &session.sink().timeline;
        assert_eq!(timeline.scheduled().len(), 2);
        assert_eq!(timeline.cursor(), Duration::from_millis(200));

        session.close().await;
        assert_eq!(session.state(), LiveState::Closed);
        assert!(script.closed());
        assert_eq!(session.transcripts().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_close_discards_partials() -> Result<()> {
        let script = FakeLiveScript::answering(vec![vec![LiveEvent::OutputTranscript(
            "half an ans".to_string(),
        )]]);
        let connector = FakeLiveConnector::new(script);
        let mut session = LiveSession::new(TimelineSink::default());
        session.open(&connector).await?;

        let result = session.run_turn(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Live { .. })));
        assert_eq!(session.state(), LiveState::Closed);
        assert_eq!(session.partial(), &LiveTranscript::default());
        assert!(session.transcripts().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_failure_closes() -> Result<()> {
        let connector = FakeLiveConnector::refusing();
        let mut session = LiveSession::new(TimelineSink::default());
        assert!(matches!(
            session.open(&connector).await,
            Err(Error::GenAi(_))
        ));
        assert_eq!(session.state(), LiveState::Closed);
        // a closed session cannot be reopened or fed
        assert!(matches!(
            session.open(&connector).await,
            Err(Error::Live { .. })
        ));
        assert!(matches!(
            session.send_audio(&[0; 10]).await,
            Err(Error::Live { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_drops_assistant_partial() -> Result<()> {
        let script = FakeLiveScript::answering(vec![vec![
            LiveEvent::OutputTranscript("Let me tell".to_string()),
            LiveEvent::Interrupted,
            LiveEvent::OutputTranscript("Sure.".to_string()),
            LiveEvent::TurnComplete,
        ]]);
        let connector = FakeLiveConnector::new(script);
        let mut session = LiveSession::new(TimelineSink::default());
        session.open(&connector).await?;

        let transcript = session.run_turn(Duration::from_secs(5)).await?;
        assert_eq!(transcript.assistant, "Sure.");
        Ok(())
    }

    #[tokio::test]
    async fn test_turn_timeout_closes() -> Result<()> {
        let script = FakeLiveScript::silent();
        let connector = FakeLiveConnector::new(script);
        let mut session = LiveSession::new(TimelineSink::default());
        session.open(&connector).await?;

        let result = session.run_turn(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(Error::Live { .. })));
        assert_eq!(session.state(), LiveState::Closed);
        Ok(())
    }
}
