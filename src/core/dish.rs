//! Dish records and the per-dish state machine.
//!
//! A dish moves through `Empty → Generating → {Ready, Failed}`, and once it has
//! an image through `Ready → Editing → {Ready, Failed}` and
//! `Ready → Analyzing → {Ready, Failed}`. While a paid operation is in flight
//! the dish is busy and refuses a second one.

use crate::{
    core::ledger::LedgerAction,
    errors::{Error, Result},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use uuid::Uuid;

/// Opaque dish identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DishId(Uuid);

impl DishId {
    /// Creates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, enough to tell dishes apart in a chat message.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for DishId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An image carried as raw bytes plus its MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// e.g. `image/png`
    pub mime_type: String,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl InlineImage {
    /// Wraps raw bytes.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 payload without the `data:` prefix.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>` form.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parses a `data:` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let invalid = || Error::Intake {
            message: "not a base64 data URL".to_string(),
        };
        let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
        let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(invalid)?;
        let data = STANDARD.decode(payload.trim()).map_err(|e| Error::Intake {
            message: format!("invalid base64 image data: {e}"),
        })?;
        Ok(Self::new(mime_type, data))
    }

    /// File extension matching the MIME type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/heic" => "heic",
            _ => "png",
        }
    }
}

/// Where a dish is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DishStatus {
    /// Draft, nothing generated yet
    Empty,
    /// Image generation in flight
    Generating,
    /// Has an image and nothing in flight
    Ready,
    /// Last operation failed, see `Dish::error`
    Failed,
    /// Image edit in flight
    Editing,
    /// Image analysis in flight
    Analyzing,
}

impl DishStatus {
    /// Whether a paid operation is in flight.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Generating | Self::Editing | Self::Analyzing)
    }

    /// Lowercase label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Editing => "editing",
            Self::Analyzing => "analyzing",
        }
    }
}

impl fmt::Display for DishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three credit-consuming operations on a dish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidOperation {
    /// Produce a new image
    Generate,
    /// Prompt-guided touch-up of the current image
    Edit,
    /// Nutrition / feedback text for the current image
    Analyze,
}

impl PaidOperation {
    /// Status the dish takes while this operation is in flight.
    #[must_use]
    pub const fn busy_status(self) -> DishStatus {
        match self {
            Self::Generate => DishStatus::Generating,
            Self::Edit => DishStatus::Editing,
            Self::Analyze => DishStatus::Analyzing,
        }
    }

    /// Ledger action recorded when the operation succeeds.
    #[must_use]
    pub const fn ledger_action(self) -> LedgerAction {
        match self {
            Self::Generate => LedgerAction::Produce,
            Self::Edit => LedgerAction::Edit,
            Self::Analyze => LedgerAction::Analyze,
        }
    }

    /// Verb used in messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Edit => "edit",
            Self::Analyze => "analyze",
        }
    }
}

/// Result payload of a successful paid operation
#[derive(Debug, Clone)]
pub enum PaidOutput {
    /// New or edited image
    Image(InlineImage),
    /// Analysis text
    Analysis(String),
}

/// A dish produced by menu intake, before it joins a session
#[derive(Debug, Clone, Default)]
pub struct DishDraft {
    /// Dish name
    pub name: String,
    /// Description or ingredients
    pub description: String,
    /// Photo the generation should follow
    pub reference_image: Option<InlineImage>,
    /// Reproduce the reference plating exactly
    pub reference_locked: bool,
}

impl DishDraft {
    /// Text-only draft.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// One menu item being turned into imagery
#[derive(Debug, Clone)]
pub struct Dish {
    /// Identity
    pub id: DishId,
    /// Dish name
    pub name: String,
    /// Description or ingredients
    pub description: String,
    /// Optional reference photo
    pub reference_image: Option<InlineImage>,
    /// Reproduce the reference plating exactly
    pub reference_locked: bool,
    /// Logo override for this dish
    pub logo_image: Option<InlineImage>,
    /// Location override for this dish
    pub location_image: Option<InlineImage>,
    /// Magic prompt fragments appended to the description
    pub magic_prompts: Vec<String>,
    /// Generated image
    pub image: Option<InlineImage>,
    /// Analysis text
    pub nutrition: Option<String>,
    /// Lifecycle state
    pub status: DishStatus,
    /// Message from the last failed operation
    pub error: Option<String>,
}

impl Dish {
    /// Turns an intake draft into a dish.
    #[must_use]
    pub fn from_draft(draft: DishDraft) -> Self {
        Self {
            id: DishId::new(),
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            reference_image: draft.reference_image,
            reference_locked: draft.reference_locked,
            logo_image: None,
            location_image: None,
            magic_prompts: Vec::new(),
            image: None,
            nutrition: None,
            status: DishStatus::Empty,
            error: None,
        }
    }

    /// Description with magic prompt fragments appended.
    #[must_use]
    pub fn full_description(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.magic_prompts.len());
        if !self.description.is_empty() {
            parts.push(self.description.trim_end_matches('.').to_string());
        }
        parts.extend(self.magic_prompts.iter().map(|p| p.trim().to_string()));
        parts.join(". ")
    }

    /// Checks that `operation` may start and marks the dish busy.
    pub fn begin(&mut self, operation: PaidOperation) -> Result<()> {
        self.ensure_can_begin(operation)?;
        self.status = operation.busy_status();
        self.error = None;
        Ok(())
    }

    /// Checks that `operation` may start without changing anything.
    pub fn ensure_can_begin(&self, operation: PaidOperation) -> Result<()> {
        if self.status.is_busy() {
            return Err(Error::DishBusy {
                name: self.name.clone(),
                status: self.status.to_string(),
            });
        }

        match operation {
            PaidOperation::Generate => {}
            PaidOperation::Edit | PaidOperation::Analyze => {
                if self.image.is_none() {
                    return Err(Error::InvalidTransition {
                        name: self.name.clone(),
                        operation: operation.verb().to_string(),
                        reason: "generate an image first".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Stores the output of a successful operation and returns to `Ready`.
    pub fn succeed(&mut self, output: PaidOutput) {
        match output {
            PaidOutput::Image(image) => {
                self.image = Some(image);
                // an old analysis describes the old picture
                self.nutrition = None;
            }
            PaidOutput::Analysis(text) => self.nutrition = Some(text),
        }
        self.status = DishStatus::Ready;
        self.error = None;
    }

    /// Records a failed operation. Any existing image is kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = DishStatus::Failed;
        self.error = Some(message.into());
    }

    /// Whether `query` names this dish (case-insensitive name or id prefix).
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        self.name.eq_ignore_ascii_case(query)
            || (query.len() >= 4
                && self
                    .id
                    .0
                    .simple()
                    .to_string()
                    .starts_with(&query.to_ascii_lowercase()))
    }
}
