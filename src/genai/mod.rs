//! Generative-AI service boundary.
//!
//! Everything that crosses the network goes through [`GenAiClient`] (REST) or
//! [`live`] (realtime audio). Loosely-typed JSON stays inside this module:
//! responses are validated into the strict types below or a [`GenAiError`].

mod error;
pub mod gemini;
pub mod live;
pub mod sse;
mod wire;

pub use error::GenAiError;
pub use gemini::GeminiClient;

use crate::core::dish::InlineImage;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Deserialize;

/// One dish found by structured menu extraction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedDish {
    /// Dish name
    pub name: String,
    /// Description, empty when the menu had none
    #[serde(default)]
    pub description: String,
}

/// Binary context sent alongside an image prompt
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// Short caption placed before the image so the prompt can refer to it
    pub label: String,
    /// The image itself
    pub image: InlineImage,
}

/// Everything needed for one image synthesis call
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Natural-language instruction
    pub prompt: String,
    /// Reference / location / logo images, in prompt order
    pub attachments: Vec<ImageAttachment>,
    /// e.g. `"4:3"`
    pub aspect_ratio: String,
    /// e.g. `"2K"`; None leaves the model default
    pub image_size: Option<String>,
}

/// Who said a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The restaurant owner
    User,
    /// The assistant
    Model,
}

impl ChatRole {
    /// Role name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One committed chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Speaker
    pub role: ChatRole,
    /// Full text of the turn
    pub text: String,
}

impl ChatTurn {
    /// Turn spoken by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// Turn spoken by the assistant.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Incremental chat tokens
pub type TokenStream = BoxStream<'static, Result<String, GenAiError>>;

/// Sample rate of synthesized speech (raw little-endian PCM16, mono)
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Calls to the generative-AI service used by intake, the orchestrator and the assistant.
#[async_trait]
pub trait GenAiClient: Send + Sync {
    /// Structured extraction of `{name, description}` pairs from menu text.
    async fn extract_dishes(&self, menu_text: &str) -> Result<Vec<ExtractedDish>, GenAiError>;

    /// Synthesizes one image.
    async fn generate_image(&self, request: &ImageRequest) -> Result<InlineImage, GenAiError>;

    /// Applies a prompt-guided edit to an existing image.
    async fn edit_image(
        &self,
        image: &InlineImage,
        instruction: &str,
    ) -> Result<InlineImage, GenAiError>;

    /// Free-text analysis of an image.
    async fn analyze_image(&self, image: &InlineImage, prompt: &str)
    -> Result<String, GenAiError>;

    /// Streams the assistant's reply token by token.
    async fn stream_chat(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<TokenStream, GenAiError>;

    /// Text-to-speech; returns raw PCM16 LE mono at [`SPEECH_SAMPLE_RATE`].
    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, GenAiError>;

    /// Speech-to-text of a WAV recording.
    async fn transcribe_audio(&self, wav: &[u8]) -> Result<String, GenAiError>;
}
