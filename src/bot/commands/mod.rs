//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Admin reporting and ledger commands
pub mod admin;

/// Chat and voice assistant commands
pub mod assistant;

/// Credit balance and purchase commands
pub mod credits;

/// General utility commands
pub mod general;

/// Menu intake commands
pub mod menu;

/// Generation, editing and export commands
pub mod studio;

// Export commands
pub use admin::*;
pub use assistant::*;
pub use credits::*;
pub use general::*;
pub use menu::*;
pub use studio::*;

use crate::{bot::BotData, errors::Error};

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        ping(),
        help(),
        menu_text(),
        menu_sheet(),
        menu_photos(),
        menu_reference(),
        menu_dictate(),
        dishes(),
        reset(),
        generate(),
        generate_all(),
        edit(),
        analyze(),
        settings(),
        brand(),
        magic(),
        export(),
        credits(),
        buy(),
        ask(),
        voice(),
        forget(),
        admin(),
    ]
}
