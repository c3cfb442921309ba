//! Application settings loading from config.toml
//!
//! Every section has defaults, so a missing or partial `config.toml` still
//! yields a working configuration. Secrets (`DISCORD_BOT_TOKEN`,
//! `GEMINI_API_KEY`) never live in this file; they come from the environment.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Generative-AI endpoints and model names
    pub genai: GenAiSettings,
    /// Credit policy and purchasable packs
    pub credits: CreditSettings,
    /// Upload limits for menu intake
    pub intake: IntakeSettings,
    /// Pre-authored prompt fragments users can attach to dishes
    pub magic_prompts: Vec<MagicPromptConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            genai: GenAiSettings::default(),
            credits: CreditSettings::default(),
            intake: IntakeSettings::default(),
            magic_prompts: default_magic_prompts(),
        }
    }
}

fn default_magic_prompts() -> Vec<MagicPromptConfig> {
    vec![
        MagicPromptConfig {
            name: "Chef's table".to_string(),
            kind: MagicPromptKind::Location,
            text: "served on a dark oak chef's table in an intimate fine-dining room, \
                candlelight and soft bokeh in the background"
                .to_string(),
        },
        MagicPromptConfig {
            name: "Seaside terrace".to_string(),
            kind: MagicPromptKind::Location,
            text: "on a sunlit terrace overlooking the sea at golden hour".to_string(),
        },
        MagicPromptConfig {
            name: "Embossed plate rim".to_string(),
            kind: MagicPromptKind::Logo,
            text: "the restaurant logo subtly embossed on the plate rim".to_string(),
        },
        MagicPromptConfig {
            name: "Steam and glow".to_string(),
            kind: MagicPromptKind::Scene,
            text: "a wisp of steam rising, warm rim light catching the sauce".to_string(),
        },
    ]
}

/// Generative-AI endpoints and model names
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenAiSettings {
    /// REST base URL
    pub base_url: String,
    /// WebSocket base URL for the realtime audio session
    pub live_url: String,
    /// Model for menu extraction, chat and image analysis
    pub text_model: String,
    /// Model for image generation and editing
    pub image_model: String,
    /// Model for text-to-speech
    pub tts_model: String,
    /// Model for the realtime voice session
    pub live_model: String,
    /// Prebuilt voice used for speech output
    pub voice: String,
    /// System instruction for the assistant
    pub assistant_instruction: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            live_url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            live_model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice: "Kore".to_string(),
            assistant_instruction: "You are a friendly culinary marketing assistant for restaurant \
                owners. Help them describe dishes, plan food photography and write menu copy. \
                Keep answers short."
                .to_string(),
            timeout_secs: 120,
        }
    }
}

/// Credit policy: sign-up grant, expiry and tier ceilings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreditSettings {
    /// Free credits granted to a new user
    pub starting_free_credits: i64,
    /// Days until free credits expire
    pub free_credit_ttl_days: i64,
    /// Paid actions per rolling 24h window on the free tier
    pub free_daily_limit: i32,
    /// Paid actions per rolling 24h window on the premium tier
    pub premium_daily_limit: i32,
    /// Purchasable credit packs
    pub packs: Vec<CreditPackConfig>,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            starting_free_credits: 3,
            free_credit_ttl_days: 7,
            free_daily_limit: 10,
            premium_daily_limit: 100,
            packs: vec![
                CreditPackConfig {
                    name: "starter".to_string(),
                    credits: 10,
                    grants_premium: false,
                },
                CreditPackConfig {
                    name: "bistro".to_string(),
                    credits: 50,
                    grants_premium: false,
                },
                CreditPackConfig {
                    name: "michelin".to_string(),
                    credits: 250,
                    grants_premium: true,
                },
            ],
        }
    }
}

impl CreditSettings {
    /// Finds a pack by name, case-insensitively.
    #[must_use]
    pub fn find_pack(&self, name: &str) -> Option<&CreditPackConfig> {
        self.packs
            .iter()
            .find(|pack| pack.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// A purchasable bundle of credits
#[derive(Debug, Clone, Deserialize)]
pub struct CreditPackConfig {
    /// Pack name used in `/buy`
    pub name: String,
    /// Credits added to the purchased balance
    pub credits: i64,
    /// Whether buying the pack upgrades the user to premium
    #[serde(default)]
    pub grants_premium: bool,
}

/// Upload limits for menu intake
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    /// Maximum number of photos processed per bulk upload
    pub max_bulk_photos: usize,
    /// Maximum size of a single photo in bytes
    pub max_photo_bytes: usize,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            max_bulk_photos: 9,
            max_photo_bytes: 4 * 1024 * 1024,
        }
    }
}

/// What a magic prompt describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicPromptKind {
    /// Background or venue
    Location,
    /// Branding placement
    Logo,
    /// Lighting, props, mood
    Scene,
}

/// A named, pre-authored prompt fragment
#[derive(Debug, Clone, Deserialize)]
pub struct MagicPromptConfig {
    /// Name shown in autocomplete
    pub name: String,
    /// What the fragment describes
    pub kind: MagicPromptKind,
    /// Text merged into the generation prompt
    pub text: String,
}

/// Loads the configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the configuration, falling back to defaults when the file is missing.
///
/// A file that exists but does not parse is still an error.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    if path_ref.exists() {
        load_config(path_ref)
    } else {
        tracing::warn!(
            "Config file {} not found, using built-in defaults",
            path_ref.display()
        );
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [genai]
            text_model = "gemini-test"
            voice = "Puck"

            [credits]
            starting_free_credits = 5
            free_daily_limit = 12

            [[credits.packs]]
            name = "tasting"
            credits = 20

            [[credits.packs]]
            name = "chef"
            credits = 300
            grants_premium = true

            [intake]
            max_bulk_photos = 4

            [[magic_prompts]]
            name = "Sunset terrace"
            kind = "location"
            text = "on a terrace overlooking the sea at golden hour"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.genai.text_model, "gemini-test");
        assert_eq!(config.genai.voice, "Puck");
        // untouched keys keep their defaults
        assert_eq!(config.genai.tts_model, "gemini-2.5-flash-preview-tts");
        assert_eq!(config.credits.starting_free_credits, 5);
        assert_eq!(config.credits.free_daily_limit, 12);
        assert_eq!(config.credits.premium_daily_limit, 100);
        assert_eq!(config.credits.packs.len(), 2);
        assert!(config.credits.packs[1].grants_premium);
        assert!(!config.credits.packs[0].grants_premium);
        assert_eq!(config.intake.max_bulk_photos, 4);
        assert_eq!(config.intake.max_photo_bytes, 4 * 1024 * 1024);
        assert_eq!(config.magic_prompts.len(), 1);
        assert_eq!(config.magic_prompts[0].kind, MagicPromptKind::Location);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.credits.free_daily_limit, 10);
        assert_eq!(config.credits.premium_daily_limit, 100);
        assert_eq!(config.intake.max_bulk_photos, 9);
        assert_eq!(config.credits.packs.len(), 3);
        assert!(!config.magic_prompts.is_empty());
    }

    #[test]
    fn test_invalid_config_is_error() {
        let result = parse_config("[credits]\nfree_daily_limit = \"ten\"");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_find_pack_case_insensitive() {
        let credits = CreditSettings::default();
        assert_eq!(credits.find_pack("Starter").unwrap().credits, 10);
        assert!(credits.find_pack("missing").is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.intake.max_bulk_photos, 9);
    }
}
