//! Realtime bidirectional audio over the Gemini Live WebSocket.
//!
//! The session protocol is JSON over WebSocket: one `setup` message, a
//! `setupComplete` acknowledgement, then `realtimeInput` audio from the client
//! and `serverContent` events from the service. [`LiveTransport`] hides the
//! socket so the session state machine in `core::live` can be driven by a fake.

use super::GenAiError;
use crate::config::settings::GenAiSettings;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{io, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

/// Sample rate the service expects for microphone input
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio the service sends back
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Something the service said during a live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Chunk of assistant speech, PCM16 LE mono at [`OUTPUT_SAMPLE_RATE`]
    Audio(Vec<u8>),
    /// Partial transcription of what the user said
    InputTranscript(String),
    /// Partial transcription of what the assistant said
    OutputTranscript(String),
    /// The assistant finished its turn
    TurnComplete,
    /// The assistant was cut off by new user speech
    Interrupted,
}

/// Something the client sends during a live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Microphone audio, PCM16 LE mono at [`INPUT_SAMPLE_RATE`]
    Audio(Vec<u8>),
    /// The user stopped talking
    AudioEnd,
}

/// An open live connection.
#[async_trait]
pub trait LiveTransport: Send {
    /// Sends one client message.
    async fn send(&mut self, message: ClientMessage) -> Result<(), GenAiError>;

    /// Waits for the next batch of events; `None` once the connection is closed.
    async fn recv(&mut self) -> Result<Option<Vec<LiveEvent>>, GenAiError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), GenAiError>;
}

/// Opens live connections that have completed the setup handshake.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connects and waits for the service to acknowledge setup.
    async fn connect(&self) -> Result<Box<dyn LiveTransport>, GenAiError>;
}

/// Builds the first message of a session.
#[must_use]
pub fn build_setup_message(model: &str, instruction: &str) -> Value {
    let model = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    };
    json!({
        "setup": {
            "model": model,
            "generationConfig": { "responseModalities": ["AUDIO"] },
            "systemInstruction": { "parts": [{ "text": instruction }] },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {}
        }
    })
}

/// Serializes a client message to its wire JSON.
#[must_use]
pub fn encode_client_message(message: &ClientMessage) -> Value {
    match message {
        ClientMessage::Audio(pcm) => json!({
            "realtimeInput": {
                "audio": {
                    "data": STANDARD.encode(pcm),
                    "mimeType": format!("audio/pcm;rate={INPUT_SAMPLE_RATE}")
                }
            }
        }),
        ClientMessage::AudioEnd => json!({ "realtimeInput": { "audioStreamEnd": true } }),
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<ServerContent>,
    go_away: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Deserialize, Default)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<ModelPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelPart {
    inline_data: Option<InlineAudio>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineAudio {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}

/// Decoded server frame
#[derive(Debug, PartialEq, Eq)]
pub enum ServerFrame {
    /// Handshake acknowledged
    SetupComplete,
    /// Service is about to drop the connection
    GoAway,
    /// Zero or more content events
    Events(Vec<LiveEvent>),
}

/// Parses one server frame.
pub fn parse_server_message(raw: &str) -> Result<ServerFrame, GenAiError> {
    let message: ServerMessage = serde_json::from_str(raw)?;
    if message.setup_complete.is_some() {
        return Ok(ServerFrame::SetupComplete);
    }
    if message.go_away.is_some() {
        return Ok(ServerFrame::GoAway);
    }

    let mut events = Vec::new();
    let Some(content) = message.server_content else {
        return Ok(ServerFrame::Events(events));
    };

    if let Some(t) = content.input_transcription.filter(|t| !t.text.is_empty()) {
        events.push(LiveEvent::InputTranscript(t.text));
    }
    if content.interrupted {
        events.push(LiveEvent::Interrupted);
    }
    for part in content.model_turn.unwrap_or_default().parts {
        let Some(inline) = part.inline_data else {
            continue;
        };
        if !inline.mime_type.is_empty() && !inline.mime_type.starts_with("audio/") {
            continue;
        }
        let pcm = STANDARD
            .decode(inline.data)
            .map_err(|e| GenAiError::InvalidResponse(format!("invalid live audio: {e}")))?;
        events.push(LiveEvent::Audio(pcm));
    }
    if let Some(t) = content.output_transcription.filter(|t| !t.text.is_empty()) {
        events.push(LiveEvent::OutputTranscript(t.text));
    }
    if content.turn_complete {
        events.push(LiveEvent::TurnComplete);
    }
    Ok(ServerFrame::Events(events))
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`LiveTransport`] over a real WebSocket.
pub struct WsTransport {
    socket: Socket,
}

impl WsTransport {
    async fn next_frame(&mut self) -> Result<Option<ServerFrame>, GenAiError> {
        loop {
            let Some(message) = self.socket.next().await else {
                return Ok(None);
            };
            let text = match message? {
                WsMessage::Text(text) => text.as_str().to_string(),
                WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                    GenAiError::InvalidResponse(format!("non UTF-8 live frame: {e}"))
                })?,
                WsMessage::Close(frame) => {
                    info!("Live session closed by server: {:?}", frame);
                    return Ok(None);
                }
                _ => continue,
            };
            return parse_server_message(&text).map(Some);
        }
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<(), GenAiError> {
        let json = encode_client_message(&message).to_string();
        self.socket.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<LiveEvent>>, GenAiError> {
        loop {
            match self.next_frame().await? {
                None => return Ok(None),
                Some(ServerFrame::Events(events)) => return Ok(Some(events)),
                Some(ServerFrame::GoAway) => {
                    warn!("Live service sent goAway");
                    return Ok(None);
                }
                Some(ServerFrame::SetupComplete) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), GenAiError> {
        self.socket.close(None).await?;
        Ok(())
    }
}

/// How long the service may take to acknowledge `setup`
pub const SETUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Connects to the Gemini Live endpoint.
#[derive(Clone)]
pub struct GeminiLiveConnector {
    settings: GenAiSettings,
    api_key: String,
    setup_timeout: Duration,
}

impl GeminiLiveConnector {
    /// Creates a connector for the configured live model.
    pub fn new(settings: GenAiSettings, api_key: impl Into<String>) -> Self {
        Self {
            settings,
            api_key: api_key.into(),
            setup_timeout: SETUP_TIMEOUT,
        }
    }

    /// Overrides the deadline for the connect and setup handshake.
    #[must_use]
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    async fn handshake(&self) -> Result<WsTransport, GenAiError> {
        let url = format!("{}?key={}", self.settings.live_url, self.api_key);
        let (socket, _) = connect_async(url).await?;
        let mut transport = WsTransport { socket };

        let setup = build_setup_message(
            &self.settings.live_model,
            &self.settings.assistant_instruction,
        );
        transport
            .socket
            .send(WsMessage::Text(setup.to_string().into()))
            .await?;

        loop {
            match transport.next_frame().await? {
                Some(ServerFrame::SetupComplete) => return Ok(transport),
                Some(_) => debug!("Ignoring frame before setupComplete"),
                None => {
                    return Err(GenAiError::InvalidResponse(
                        "live connection closed during setup".to_string(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self) -> Result<Box<dyn LiveTransport>, GenAiError> {
        info!(model = %self.settings.live_model, "Opening live session");
        let transport = tokio::time::timeout(self.setup_timeout, self.handshake())
            .await
            .map_err(|_| {
                warn!(
                    timeout_secs = self.setup_timeout.as_secs(),
                    "Live setup was not acknowledged"
                );
                GenAiError::WebSocket(Box::new(WsError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "live setup was not acknowledged in time",
                ))))
            })??;
        info!("Live session ready");
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_unacknowledged_setup_times_out() -> Result<(), GenAiError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(WsError::Io)?;
        let addr = listener.local_addr().map_err(WsError::Io)?;
        // accepts the socket and reads `setup`, but never answers it
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            let setup = socket.next().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            setup
        });

        let settings = GenAiSettings {
            live_url: format!("ws://{addr}"),
            ..GenAiSettings::default()
        };
        let connector =
            GeminiLiveConnector::new(settings, "key").with_setup_timeout(Duration::from_millis(200));
        let result = connector.connect().await;

        assert!(matches!(result, Err(GenAiError::WebSocket(ref e)) if matches!(**e, WsError::Io(ref source) if source.kind() == io::ErrorKind::TimedOut)));
        server.abort();
        Ok(())
    }

    #[test]
    fn test_setup_message_shape() {
        let setup = build_setup_message("gemini-live", "be brief");
        assert_eq!(setup["setup"]["model"], "models/gemini-live");
        assert_eq!(
            setup["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert!(setup["setup"]["inputAudioTranscription"].is_object());
        assert!(setup["setup"]["outputAudioTranscription"].is_object());

        let setup = build_setup_message("models/already", "x");
        assert_eq!(setup["setup"]["model"], "models/already");
    }

    #[test]
    fn test_encode_client_audio() {
        let json = encode_client_message(&ClientMessage::Audio(vec![0, 1, 2, 3]));
        assert_eq!(json["realtimeInput"]["audio"]["data"], "AAECAw==");
        assert_eq!(
            json["realtimeInput"]["audio"]["mimeType"],
            "audio/pcm;rate=16000"
        );
        let end = encode_client_message(&ClientMessage::AudioEnd);
        assert_eq!(end["realtimeInput"]["audioStreamEnd"], true);
    }

    #[test]
    fn test_parse_setup_complete() {
        assert_eq!(
            parse_server_message(r#"{"setupComplete":{}}"#).unwrap(),
            ServerFrame::SetupComplete
        );
    }

    #[test]
    fn test_parse_server_content_orders_events() {
        let raw = r#"{"serverContent":{
            "inputTranscription":{"text":"what wine"},
            "modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAE="}}]},
            "outputTranscription":{"text":"A Barolo"},
            "turnComplete":true}}"#;
        let ServerFrame::Events(events) = parse_server_message(raw).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(
            events,
            vec![
                LiveEvent::InputTranscript("what wine".to_string()),
                LiveEvent::Audio(vec![0, 1]),
                LiveEvent::OutputTranscript("A Barolo".to_string()),
                LiveEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn test_parse_interrupted_and_unknown() {
        let ServerFrame::Events(events) =
            parse_server_message(r#"{"serverContent":{"interrupted":true}}"#).unwrap()
        else {
            panic!("expected events");
        };
        assert_eq!(events, vec![LiveEvent::Interrupted]);

        assert_eq!(
            parse_server_message(r#"{"usageMetadata":{"totalTokenCount":3}}"#).unwrap(),
            ServerFrame::Events(vec![])
        );
        assert!(parse_server_message("not json").is_err());
    }
}
