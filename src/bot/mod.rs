//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the `MenuStudio` application,
//! including all slash commands, autocomplete handlers, and bot context management.

/// Discord command implementations (menu, studio, credits, assistant, admin, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;
/// Shared reply helpers for commands
pub mod util;

use crate::{
    config::AppConfig,
    core::{orchestrator::Orchestrator, session::Studio},
    errors::{Error, Result},
    genai::{GenAiClient, live::LiveConnector},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
/// This structure holds the database connection, the per-user studio state and
/// the clients for the AI service.
pub struct BotData {
    /// Database connection for the credit ledger
    pub database: DatabaseConnection,
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Per-user sessions
    pub studio: Arc<Studio>,
    /// Paid dish operations
    pub orchestrator: Orchestrator,
    /// REST client for the AI service
    pub genai: Arc<dyn GenAiClient>,
    /// Opens realtime voice sessions
    pub live: Arc<dyn LiveConnector>,
}

impl BotData {
    /// Wires the studio and orchestrator to the database and AI clients.
    #[must_use]
    pub fn new(
        database: DatabaseConnection,
        config: Arc<AppConfig>,
        genai: Arc<dyn GenAiClient>,
        live: Arc<dyn LiveConnector>,
    ) -> Self {
        let studio = Arc::new(Studio::new());
        let orchestrator = Orchestrator::new(
            database.clone(),
            Arc::clone(&studio),
            Arc::clone(&genai),
            config.credits.clone(),
        );
        Self {
            database,
            config,
            studio,
            orchestrator,
            genai,
            live,
        }
    }
}

/// Poise context used by every command
pub type Context<'a> = poise::Context<'a, BotData, Error>;

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error:?}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {error:?}", ctx.command().name);
            let reply = poise::CreateReply::default()
                .content(format!("❌ {error}"))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Registers the commands and runs the Discord client until it stops.
#[instrument(skip_all)]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e:?}"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e:?}"))?;
    Ok(())
}
