//! Unified error type for `MenuStudio`.
//!
//! Every layer (core, config, genai, bot) returns [`Result`], so command
//! handlers can use `?` end to end and the bot's `on_error` hook can report
//! a readable message back to the user.

use crate::genai::GenAiError;
use thiserror::Error;

/// All errors that can occur in the application.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// No user record with this id
    #[error("User not found: {user_id}")]
    UserNotFound {
        /// Discord user id that was looked up
        user_id: String,
    },

    /// No dish in the session matches
    #[error("Dish not found: {dish}")]
    DishNotFound {
        /// Name or id the caller used
        dish: String,
    },

    /// The dish already has a paid operation in flight
    #[error("Dish '{name}' is busy ({status})")]
    DishBusy {
        /// Dish name
        name: String,
        /// Current status label
        status: String,
    },

    /// The requested operation is not legal from the dish's current state
    #[error("Cannot {operation} '{name}': {reason}")]
    InvalidTransition {
        /// Dish name
        name: String,
        /// Operation label
        operation: String,
        /// Why it was refused
        reason: String,
    },

    /// Credit balance is exhausted
    #[error("Insufficient credits: balance is {balance}")]
    InsufficientCredits {
        /// Spendable balance at the time of the check
        balance: i64,
    },

    /// Tier daily ceiling reached
    #[error("Daily limit reached: {used}/{limit} paid actions used")]
    DailyQuotaExceeded {
        /// Actions counted in the current window (including in-flight ones)
        used: i32,
        /// Tier ceiling
        limit: i32,
    },

    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Offending amount
        amount: i64,
    },

    /// Rejected user input (bad file, blank text, ...)
    #[error("Intake error: {message}")]
    Intake {
        /// What was wrong with the input
        message: String,
    },

    /// Input was readable but contained no dishes
    #[error("No dishes found in {origin}")]
    NoDishesFound {
        /// Where we looked ("menu text", "spreadsheet", ...)
        origin: String,
    },

    /// Generative-AI API failure
    #[error(transparent)]
    GenAi(#[from] GenAiError),

    /// Malformed or unsupported audio
    #[error("Audio error: {message}")]
    Audio {
        /// What was wrong with the audio
        message: String,
    },

    /// Realtime voice session failure
    #[error("Live session error: {message}")]
    Live {
        /// What went wrong
        message: String,
    },

    /// ZIP archive failure
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// String formatting failure
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Serenity/Poise framework failure
    #[error("Discord error: {0}")]
    Discord(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
