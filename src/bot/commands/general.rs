//! General Discord commands - ping and help.
//! These commands don't touch the studio or the ledger.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**MenuStudio Help**\n\
        Turn your menu into Michelin-style food photography.\n\n\
        **1. Add dishes**\n\
        • `/menu_text <text>` - Paste your menu, dishes are extracted automatically.\n\
        • `/menu_sheet <file>` - Import a CSV export of your menu spreadsheet.\n\
        • `/menu_photos <photos>` - Up to 9 dish photos, one dish each.\n\
        • `/menu_reference <photo> [name]` - Reproduce a photo's plating exactly.\n\
        • `/menu_dictate` - Dictate your menu as voice recordings, then submit.\n\
        • `/dishes` - Show your dish list. `/reset` - Start over.\n\n\
        **2. Produce images** (1 credit each, charged only on success)\n\
        • `/generate <dish>` or `/generate_all`\n\
        • `/edit <dish> <instruction>` - Touch up a generated image.\n\
        • `/analyze <dish>` - Nutrition estimate and plating feedback.\n\
        • `/settings`, `/brand`, `/magic` - Style, logo/location and prompt fragments.\n\
        • `/export` - Download all images as a ZIP.\n\n\
        **Credits**\n\
        • `/credits` - Balance and daily limit. `/buy <pack>` - Add credits.\n\n\
        **Assistant** (free)\n\
        • `/ask <question> [speak]` - Chat about menus and marketing.\n\
        • `/voice <recording>` - Talk to the assistant with a WAV recording.\n\
        • `/forget` - Clear the conversation.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
