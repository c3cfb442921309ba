//! Shared test utilities for `MenuStudio`.
//!
//! This module provides an in-memory database, users with chosen balances, and
//! scripted fakes for the AI service and the realtime voice session.

use crate::{
    config::settings::CreditSettings,
    core::{audio::encode_pcm16le, dish::InlineImage, ledger::Tier},
    entities::user,
    errors::Result,
    genai::{
        ChatTurn, ExtractedDish, GenAiClient, GenAiError, ImageRequest, TokenStream,
        live::{ClientMessage, LiveConnector, LiveEvent, LiveTransport},
    },
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures_util::{StreamExt, stream};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Credit policy used by tests: the built-in defaults.
#[must_use]
pub fn test_policy() -> CreditSettings {
    CreditSettings::default()
}

/// Creates a test user with the given balances.
///
/// # Defaults
/// * `display_name`: `"Chef"`
/// * `tier`: free
/// * free credits expire in 7 days
pub async fn create_test_user(
    db: &DatabaseConnection,
    user_id: &str,
    purchased: i64,
    free: i64,
) -> Result<user::Model> {
    let now = Utc::now();
    let model = user::ActiveModel {
        id: Set(user_id.to_string()),
        display_name: Set("Chef".to_string()),
        email: Set(None),
        purchased_credits: Set(purchased),
        free_credits: Set(free),
        free_credits_expire_at: Set(Some(now + Duration::days(7))),
        tier: Set(Tier::Free.as_str().to_string()),
        daily_usage: Set(0),
        last_usage_at: Set(None),
        lifetime_generations: Set(0),
        created_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

/// Smallest valid PNG header, enough for code that only checks the MIME type.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Samples returned by [`FakeGenAi::synthesize_speech`] (100 ms at 24 kHz)
pub const FAKE_SPEECH_SAMPLES: usize = 2_400;

/// Deterministic stand-in for the AI service.
///
/// Every call is counted. A failing fake returns an API error from every method.
#[derive(Debug, Default)]
pub struct FakeGenAi {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeGenAi {
    /// Fake that answers every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> std::result::Result<(), GenAiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(GenAiError::Api {
                status: 500,
                message: "fake outage".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GenAiClient for FakeGenAi {
    /// Every `name: description` line becomes a dish; other lines are ignored.
    async fn extract_dishes(
        &self,
        menu_text: &str,
    ) -> std::result::Result<Vec<ExtractedDish>, GenAiError> {
        self.record()?;
        Ok(menu_text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(name, description)| ExtractedDish {
                name: name.trim().to_string(),
                description: description.trim().to_string(),
            })
            .collect())
    }

    async fn generate_image(
        &self,
        _request: &ImageRequest,
    ) -> std::result::Result<InlineImage, GenAiError> {
        self.record()?;
        Ok(InlineImage::new("image/png", FAKE_PNG.to_vec()))
    }

    async fn edit_image(
        &self,
        _image: &InlineImage,
        _instruction: &str,
    ) -> std::result::Result<InlineImage, GenAiError> {
        self.record()?;
        Ok(InlineImage::new("image/png", FAKE_PNG.to_vec()))
    }

    async fn analyze_image(
        &self,
        _image: &InlineImage,
        _prompt: &str,
    ) -> std::result::Result<String, GenAiError> {
        self.record()?;
        Ok("Calories: about 450 kcal. Allergens: none detected.".to_string())
    }

    /// Echoes the message back in three tokens.
    async fn stream_chat(
        &self,
        _history: &[ChatTurn],
        message: &str,
    ) -> std::result::Result<TokenStream, GenAiError> {
        self.record()?;
        let tokens = vec![
            Ok("You said: ".to_string()),
            Ok(message.to_string()),
            Ok(".".to_string()),
        ];
        Ok(stream::iter(tokens).boxed())
    }

    async fn synthesize_speech(&self, _text: &str) -> std::result::Result<Vec<u8>, GenAiError> {
        self.record()?;
        Ok(encode_pcm16le(&[100; FAKE_SPEECH_SAMPLES]))
    }

    async fn transcribe_audio(&self, wav: &[u8]) -> std::result::Result<String, GenAiError> {
        self.record()?;
        Ok(format!("Dictated dish: {} bytes of speech", wav.len()))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    batches: VecDeque<Vec<LiveEvent>>,
    silent: bool,
    sent_audio_chunks: usize,
    audio_ended: bool,
    closed: bool,
}

/// Scripted server side of a live session. Clones share the same script, so a
/// test keeps one handle to inspect what the session sent.
#[derive(Debug, Clone, Default)]
pub struct FakeLiveScript {
    state: Arc<Mutex<ScriptState>>,
}

impl FakeLiveScript {
    /// Server that replies with `batches`, one per receive, then hangs up.
    #[must_use]
    pub fn answering(batches: Vec<Vec<LiveEvent>>) -> Self {
        let script = Self::default();
        script.with(|s| s.batches = batches.into());
        script
    }

    /// Server that never says anything.
    #[must_use]
    pub fn silent() -> Self {
        let script = Self::default();
        script.with(|s| s.silent = true);
        script
    }

    fn with<R>(&self, f: impl FnOnce(&mut ScriptState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    /// Audio messages received from the session.
    pub fn sent_audio_chunks(&self) -> usize {
        self.with(|s| s.sent_audio_chunks)
    }

    /// Whether the session signalled the end of the user's speech.
    pub fn audio_ended(&self) -> bool {
        self.with(|s| s.audio_ended)
    }

    /// Whether the session closed the transport.
    pub fn closed(&self) -> bool {
        self.with(|s| s.closed)
    }
}

struct FakeLiveTransport {
    script: FakeLiveScript,
}

#[async_trait]
impl LiveTransport for FakeLiveTransport {
    async fn send(&mut self, message: ClientMessage) -> std::result::Result<(), GenAiError> {
        self.script.with(|s| match message {
            ClientMessage::Audio(_) => s.sent_audio_chunks += 1,
            ClientMessage::AudioEnd => s.audio_ended = true,
        });
        Ok(())
    }

    async fn recv(&mut self) -> std::result::Result<Option<Vec<LiveEvent>>, GenAiError> {
        let (silent, next) = self.script.with(|s| (s.silent, s.batches.pop_front()));
        if silent {
            std::future::pending::<()>().await;
        }
        Ok(next)
    }

    async fn close(&mut self) -> std::result::Result<(), GenAiError> {
        self.script.with(|s| s.closed = true);
        Ok(())
    }
}

/// Connector handing out transports bound to one script.
#[derive(Debug, Clone)]
pub struct FakeLiveConnector {
    script: Option<FakeLiveScript>,
}

impl FakeLiveConnector {
    /// Connector that always connects to `script`.
    #[must_use]
    pub const fn new(script: FakeLiveScript) -> Self {
        Self {
            script: Some(script),
        }
    }

    /// Connector whose handshake always fails.
    #[must_use]
    pub const fn refusing() -> Self {
        Self { script: None }
    }
}

#[async_trait]
impl LiveConnector for FakeLiveConnector {
    async fn connect(&self) -> std::result::Result<Box<dyn LiveTransport>, GenAiError> {
        match &self.script {
            Some(script) => Ok(Box::new(FakeLiveTransport {
                script: script.clone(),
            })),
            None => Err(GenAiError::InvalidResponse(
                "handshake refused".to_string(),
            )),
        }
    }
}
