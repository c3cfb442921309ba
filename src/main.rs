#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use menu_studio::{
    bot::{self, BotData},
    config::{self, database},
    errors::{Error, Result},
    genai::{GeminiClient, GenAiClient, live::GeminiLiveConnector, live::LiveConnector},
};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let app_config = config::load_config_or_default(&config_path)
        .inspect_err(|e| error!("Failed to load {config_path}: {e}"))?;
    let app_config = Arc::new(app_config);
    info!(
        packs = app_config.credits.packs.len(),
        magic_prompts = app_config.magic_prompts.len(),
        "Configuration loaded"
    );

    // 4. Initialize the ledger database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. AI clients
    let api_key = env::var("GEMINI_API_KEY")
        .inspect_err(|e| error!("GEMINI_API_KEY not found: {e}"))
        .map_err(Error::EnvVar)?;
    let genai: Arc<dyn GenAiClient> =
        Arc::new(GeminiClient::new(app_config.genai.clone(), api_key.clone())?);
    let live: Arc<dyn LiveConnector> =
        Arc::new(GeminiLiveConnector::new(app_config.genai.clone(), api_key));

    let data = BotData::new(db, Arc::clone(&app_config), genai, live);

    // 6. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, data).await
}
