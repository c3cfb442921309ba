//! Studio Discord commands - paid dish operations, generation settings and export.
//!
//! Generate, edit and analyze go through the orchestrator, which charges one
//! credit only when the AI call succeeds.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::autocomplete,
            util::{self, author},
        },
        core::{
            export,
            intake::PhotoUpload,
            orchestrator::OperationOutcome,
            prompt::{self, AspectRatio, ImageSize, Quality, Style},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    async fn dish_id(
        ctx: poise::Context<'_, BotData, Error>,
        user_id: &str,
        dish: &str,
    ) -> Result<crate::core::dish::DishId> {
        Ok(ctx.data().studio.find_dish(user_id, dish).await?.id)
    }

    /// Photographs one dish (1 credit, charged on success).
    #[poise::command(slash_command)]
    pub async fn generate(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dish to photograph"]
        #[autocomplete = "autocomplete::autocomplete_dish_name"]
        dish: String,
    ) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        let id = dish_id(ctx, &user_id, &dish).await?;
        ctx.defer().await?;

        let outcome = ctx
            .data()
            .orchestrator
            .generate(&user_id, &display_name, id)
            .await?;
        ctx.send(util::outcome_reply(&outcome, "Photographed"))
            .await?;
        Ok(())
    }

    /// Photographs every dish that has no image yet.
    #[poise::command(slash_command)]
    pub async fn generate_all(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        ctx.defer().await?;

        let results = ctx
            .data()
            .orchestrator
            .generate_all(&user_id, &display_name)
            .await;
        if results.is_empty() {
            ctx.say("🍽️ Every dish already has a photo, or none are waiting.")
                .await?;
            return Ok(());
        }

        let mut summary = String::new();
        let mut charged = 0;
        for (id, result) in &results {
            match result {
                Ok(OperationOutcome::Succeeded { dish, .. }) => {
                    charged += 1;
                    writeln!(summary, "✅ **{}**", dish.name)?;
                }
                Ok(OperationOutcome::Failed { dish, error }) => {
                    let name = dish.as_ref().map_or_else(|| id.short(), |d| d.name.clone());
                    writeln!(summary, "❌ **{name}**: {error}")?;
                }
                Err(e) => writeln!(summary, "⛔ `{}`: {e}", id.short())?,
            }
        }
        write!(
            summary,
            "\n{charged} credit{} used. Use `/dishes` to review.",
            if charged == 1 { "" } else { "s" }
        )?;
        ctx.say(util::truncate_message(&summary)).await?;

        for (_, result) in results {
            if let Ok(OperationOutcome::Succeeded { dish, .. }) = result {
                ctx.send(util::dish_reply(&dish, "📸")).await?;
            }
        }
        Ok(())
    }

    /// Touches up a dish's photo with an instruction (1 credit).
    #[poise::command(slash_command)]
    pub async fn edit(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dish to edit"]
        #[autocomplete = "autocomplete::autocomplete_dish_name"]
        dish: String,
        #[description = "What to change, e.g. 'add a sprig of basil'"] instruction: String,
    ) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        let id = dish_id(ctx, &user_id, &dish).await?;
        ctx.defer().await?;

        let outcome = ctx
            .data()
            .orchestrator
            .edit(&user_id, &display_name, id, &instruction)
            .await?;
        ctx.send(util::outcome_reply(&outcome, "Edited")).await?;
        Ok(())
    }

    /// Estimates nutrition and reviews the plating of a dish's photo (1 credit).
    #[poise::command(slash_command)]
    pub async fn analyze(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dish to analyze"]
        #[autocomplete = "autocomplete::autocomplete_dish_name"]
        dish: String,
    ) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        let id = dish_id(ctx, &user_id, &dish).await?;
        ctx.defer().await?;

        let outcome = ctx
            .data()
            .orchestrator
            .analyze(&user_id, &display_name, id)
            .await?;
        ctx.send(util::outcome_reply(&outcome, "Analyzed")).await?;
        Ok(())
    }

    /// Shows or changes style, quality, size and aspect ratio.
    #[poise::command(slash_command)]
    pub async fn settings(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Photographic style"]
        #[autocomplete = "autocomplete::autocomplete_style"]
        style: Option<String>,
        #[description = "Rendering quality"]
        #[autocomplete = "autocomplete::autocomplete_quality"]
        quality: Option<String>,
        #[description = "Output resolution"]
        #[autocomplete = "autocomplete::autocomplete_size"]
        size: Option<String>,
        #[description = "Aspect ratio"]
        #[autocomplete = "autocomplete::autocomplete_aspect_ratio"]
        aspect_ratio: Option<String>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);

        // parse everything before changing anything
        let style = style.map(|s| s.parse::<Style>()).transpose()?;
        let quality = quality.map(|s| s.parse::<Quality>()).transpose()?;
        let size = size.map(|s| s.parse::<ImageSize>()).transpose()?;
        let aspect_ratio = aspect_ratio
            .map(|s| s.parse::<AspectRatio>())
            .transpose()?;

        let settings = ctx
            .data()
            .studio
            .update_settings(&user_id, |settings| {
                if let Some(style) = style {
                    settings.style = style;
                }
                if let Some(quality) = quality {
                    settings.quality = quality;
                }
                if let Some(size) = size {
                    settings.size = size;
                }
                if let Some(aspect_ratio) = aspect_ratio {
                    settings.aspect_ratio = aspect_ratio;
                }
            })
            .await;

        let mut response = String::from("🎛️ **Generation settings**\n");
        writeln!(response, "Style: **{}**", settings.style)?;
        writeln!(response, "Quality: **{}**", settings.quality)?;
        writeln!(response, "Size: **{}**", settings.size)?;
        writeln!(response, "Aspect ratio: **{}**", settings.aspect_ratio)?;
        writeln!(
            response,
            "Logo: {} · Location: {}",
            if settings.logo_image.is_some() { "set" } else { "none" },
            if settings.location_image.is_some() { "set" } else { "none" }
        )?;
        ctx.say(response).await?;
        Ok(())
    }

    /// Sets the restaurant logo and location photo, globally or for one dish.
    #[poise::command(slash_command)]
    pub async fn brand(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Restaurant logo"] logo: Option<serenity::Attachment>,
        #[description = "Photo of the venue, used as background"] location: Option<
            serenity::Attachment,
        >,
        #[description = "Only for this dish"]
        #[autocomplete = "autocomplete::autocomplete_dish_name"]
        dish: Option<String>,
        #[description = "Remove the logo and location instead"] clear: Option<bool>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        let limits = &ctx.data().config.intake;
        let clear = clear.unwrap_or(false);

        if !clear && logo.is_none() && location.is_none() {
            ctx.say("❌ Attach a logo, a location photo, or set `clear`.")
                .await?;
            return Ok(());
        }

        let mut images = Vec::with_capacity(2);
        for attachment in [&logo, &location] {
            let image = match attachment {
                Some(attachment) => {
                    let upload: PhotoUpload = util::download(attachment).await?;
                    Some(upload.to_image(limits)?)
                }
                None => None,
            };
            images.push(image);
        }
        let location_image = images.pop().flatten();
        let logo_image = images.pop().flatten();

        let target = if let Some(dish) = dish {
            let updated = ctx
                .data()
                .studio
                .update_dish(&user_id, &dish, |d| {
                    if clear {
                        d.logo_image = None;
                        d.location_image = None;
                    }
                    if logo_image.is_some() {
                        d.logo_image.clone_from(&logo_image);
                    }
                    if location_image.is_some() {
                        d.location_image.clone_from(&location_image);
                    }
                })
                .await?;
            format!("**{}**", updated.name)
        } else {
            ctx.data()
                .studio
                .update_settings(&user_id, |s| {
                    if clear {
                        s.logo_image = None;
                        s.location_image = None;
                    }
                    if logo_image.is_some() {
                        s.logo_image.clone_from(&logo_image);
                    }
                    if location_image.is_some() {
                        s.location_image.clone_from(&location_image);
                    }
                })
                .await;
            "all dishes".to_string()
        };

        let action = if clear { "cleared" } else { "updated" };
        ctx.say(format!("🏷️ Branding {action} for {target}."))
            .await?;
        Ok(())
    }

    /// Adds a pre-written prompt fragment to a dish.
    #[poise::command(slash_command)]
    pub async fn magic(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dish to enhance"]
        #[autocomplete = "autocomplete::autocomplete_dish_name"]
        dish: String,
        #[description = "Magic prompt"]
        #[autocomplete = "autocomplete::autocomplete_magic_prompt"]
        prompt: Option<String>,
        #[description = "Remove all magic prompts from the dish"] clear: Option<bool>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        let config = &ctx.data().config;

        if clear.unwrap_or(false) {
            let updated = ctx
                .data()
                .studio
                .update_dish(&user_id, &dish, |d| d.magic_prompts.clear())
                .await?;
            ctx.say(format!("✨ Magic prompts removed from **{}**.", updated.name))
                .await?;
            return Ok(());
        }

        let Some(prompt_name) = prompt else {
            let mut response = String::from("✨ **Magic prompts**\n");
            for magic in &config.magic_prompts {
                writeln!(
                    response,
                    "• **{}** ({}) - {}",
                    magic.name,
                    prompt::magic_kind_label(magic.kind),
                    magic.text
                )?;
            }
            ctx.say(util::truncate_message(&response)).await?;
            return Ok(());
        };

        let Some(magic) = prompt::find_magic_prompt(&config.magic_prompts, &prompt_name) else {
            ctx.say(format!("❌ Unknown magic prompt '{prompt_name}'."))
                .await?;
            return Ok(());
        };

        let text = magic.text.clone();
        let updated = ctx
            .data()
            .studio
            .update_dish(&user_id, &dish, |d| {
                if !d.magic_prompts.contains(&text) {
                    d.magic_prompts.push(text.clone());
                }
            })
            .await?;
        ctx.say(format!(
            "✨ **{}** now uses *{}* ({} magic prompt{}).",
            updated.name,
            magic.name,
            updated.magic_prompts.len(),
            if updated.magic_prompts.len() == 1 { "" } else { "s" }
        ))
        .await?;
        Ok(())
    }

    /// Downloads every generated photo as a ZIP archive.
    #[poise::command(slash_command)]
    pub async fn export(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        let dishes = ctx.data().studio.snapshot(&user_id).await;
        let archive = export::build_archive(&dishes)?;

        let reply = poise::CreateReply::default()
            .content("📦 Your menu photos")
            .attachment(serenity::CreateAttachment::bytes(archive, "menu-photos.zip"));
        ctx.send(reply).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
