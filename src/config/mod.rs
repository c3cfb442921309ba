/// Admin user configuration from environment variables
pub mod admins;

/// Database configuration and connection management
pub mod database;

/// Application settings loading from config.toml
pub mod settings;

pub use settings::{AppConfig, load_config, load_config_or_default};
