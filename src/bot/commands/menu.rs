//! Menu intake Discord commands - text, spreadsheet, photos, reference photo and dictation.
//!
//! Every import is validated before the dish list changes: a failed import
//! leaves the existing dishes untouched.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            util::{self, author},
        },
        core::{dish::Dish, intake},
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;
    use tracing::info;

    fn added_summary(added: &[Dish]) -> Result<String> {
        let mut response = format!(
            "🍽️ Added {} dish{}:\n",
            added.len(),
            if added.len() == 1 { "" } else { "es" }
        );
        for dish in added {
            writeln!(response, "• **{}**", dish.name)?;
        }
        response.push_str("\nUse `/generate_all` to photograph them.");
        Ok(util::truncate_message(&response))
    }

    /// Extracts dishes from pasted menu text.
    #[poise::command(slash_command)]
    pub async fn menu_text(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Your menu, names with descriptions or ingredients"] text: String,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        ctx.defer().await?;

        let drafts = intake::parse_menu_text(ctx.data().genai.as_ref(), &text).await?;
        let added = ctx.data().studio.add_drafts(&user_id, drafts).await;
        ctx.say(added_summary(&added)?).await?;
        Ok(())
    }

    /// Imports dishes from a CSV spreadsheet.
    ///
    /// A header row naming the dish and description columns is recognised in
    /// English and Romanian; without one the first two filled cells of each row
    /// are read as name and description.
    #[poise::command(slash_command)]
    pub async fn menu_sheet(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Menu spreadsheet saved as CSV"] file: serenity::Attachment,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        let upload = util::download(&file).await?;
        let drafts = intake::import_spreadsheet(&upload.data)?;
        let added = ctx.data().studio.add_drafts(&user_id, drafts).await;
        ctx.say(added_summary(&added)?).await?;
        Ok(())
    }

    /// Creates one dish per photo, named after the file.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command)]
    pub async fn menu_photos(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Dish photo"] photo_1: serenity::Attachment,
        #[description = "Dish photo"] photo_2: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_3: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_4: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_5: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_6: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_7: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_8: Option<serenity::Attachment>,
        #[description = "Dish photo"] photo_9: Option<serenity::Attachment>,
        #[description = "Dish photo (ignored, at most 9 are processed)"] photo_10: Option<
            serenity::Attachment,
        >,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        ctx.defer().await?;

        let attachments: Vec<serenity::Attachment> = std::iter::once(photo_1)
            .chain(
                [
                    photo_2, photo_3, photo_4, photo_5, photo_6, photo_7, photo_8, photo_9,
                    photo_10,
                ]
                .into_iter()
                .flatten(),
            )
            .collect();

        let limits = &ctx.data().config.intake;
        let mut uploads = Vec::with_capacity(attachments.len());
        for attachment in attachments.iter().take(limits.max_bulk_photos) {
            uploads.push(util::download(attachment).await?);
        }
        // the rest only count towards the limit warning
        for attachment in attachments.iter().skip(limits.max_bulk_photos) {
            uploads.push(intake::PhotoUpload {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                data: Vec::new(),
            });
        }

        let bulk = intake::import_bulk_photos(&uploads, limits);
        let mut response = if bulk.drafts.is_empty() {
            "❌ None of the photos could be used.".to_string()
        } else {
            let added = ctx.data().studio.add_drafts(&user_id, bulk.drafts).await;
            added_summary(&added)?
        };
        for warning in &bulk.warnings {
            write!(response, "\n⚠️ {warning}")?;
        }
        ctx.say(util::truncate_message(&response)).await?;
        Ok(())
    }

    /// Adds a dish whose plating should reproduce a photo exactly.
    #[poise::command(slash_command)]
    pub async fn menu_reference(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Photo of the plated dish"] photo: serenity::Attachment,
        #[description = "Dish name (defaults to the file name)"] name: Option<String>,
        #[description = "Description or ingredients"] description: Option<String>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        let upload = util::download(&photo).await?;
        let draft = intake::reference_photo_draft(
            name.as_deref().unwrap_or_default(),
            description.as_deref().unwrap_or_default(),
            &upload,
            &ctx.data().config.intake,
        )?;
        let added = ctx.data().studio.add_drafts(&user_id, vec![draft]).await;
        ctx.say(added_summary(&added)?).await?;
        Ok(())
    }

    /// Dictate your menu, then submit it for extraction.
    #[poise::command(
        slash_command,
        subcommands("dictate_add", "dictate_show", "dictate_submit")
    )]
    pub async fn menu_dictate(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Dictation commands:\n\
            `/menu_dictate add` - Add a WAV recording or typed text\n\
            `/menu_dictate show` - Show what has been dictated so far\n\
            `/menu_dictate submit` - Extract dishes from the dictation";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Adds a recording (or typed text) to the dictation.
    #[poise::command(slash_command, rename = "add")]
    pub async fn dictate_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "WAV recording of you reading the menu"] recording: Option<
            serenity::Attachment,
        >,
        #[description = "Text to add instead of a recording"] text: Option<String>,
        #[description = "Show the text without keeping it yet"] partial: Option<bool>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);

        let text = match (recording, text) {
            (Some(recording), _) => {
                ctx.defer().await?;
                let upload = util::download(&recording).await?;
                intake::transcribe_recording(ctx.data().genai.as_ref(), &upload.data).await?
            }
            (None, Some(text)) => text,
            (None, None) => {
                ctx.say("❌ Attach a recording or type some text.").await?;
                return Ok(());
            }
        };

        let shown = ctx
            .data()
            .studio
            .with_session(&user_id, |session| {
                if partial.unwrap_or(false) {
                    session.dictation.set_interim(&text);
                } else {
                    session.dictation.finalize(&text);
                }
                session.dictation.display_text()
            })
            .await;

        ctx.say(util::truncate_message(&format!(
            "🎙️ **Dictation so far**\n{shown}"
        )))
        .await?;
        Ok(())
    }

    /// Shows the dictation collected so far.
    #[poise::command(slash_command, rename = "show")]
    pub async fn dictate_show(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        let shown = ctx
            .data()
            .studio
            .with_session(&user_id, |session| session.dictation.display_text())
            .await;

        if shown.is_empty() {
            ctx.say("🎙️ Nothing dictated yet. Use `/menu_dictate add`.")
                .await?;
        } else {
            ctx.say(util::truncate_message(&format!(
                "🎙️ **Dictation so far**\n{shown}"
            )))
            .await?;
        }
        Ok(())
    }

    /// Extracts dishes from the dictation and clears it.
    #[poise::command(slash_command, rename = "submit")]
    pub async fn dictate_submit(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        let text = ctx
            .data()
            .studio
            .with_session(&user_id, |session| session.dictation.committed().to_string())
            .await;

        ctx.defer().await?;
        let drafts = intake::parse_menu_text(ctx.data().genai.as_ref(), &text).await?;
        let added = ctx.data().studio.add_drafts(&user_id, drafts).await;
        ctx.data()
            .studio
            .with_session(&user_id, |session| session.dictation.clear())
            .await;
        info!(user_id, dishes = added.len(), "Dictation submitted");
        ctx.say(added_summary(&added)?).await?;
        Ok(())
    }

    /// Lists the dishes in your studio.
    #[poise::command(slash_command, prefix_command)]
    pub async fn dishes(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        let dishes = ctx.data().studio.snapshot(&user_id).await;

        if dishes.is_empty() {
            ctx.say("🍽️ No dishes yet. Start with `/menu_text`, `/menu_sheet` or `/menu_photos`.")
                .await?;
            return Ok(());
        }

        let ready = dishes.iter().filter(|d| d.image.is_some()).count();
        let mut response = format!("🍽️ **Your dishes** ({ready}/{} photographed)\n\n", dishes.len());
        for dish in &dishes {
            writeln!(response, "{}", util::dish_line(dish)?)?;
        }
        ctx.say(util::truncate_message(&response)).await?;
        Ok(())
    }

    /// Removes all dishes and the dictation. Credits are not affected.
    #[poise::command(slash_command)]
    pub async fn reset(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        let removed = ctx.data().studio.reset(&user_id).await;
        ctx.say(format!("🧹 Removed {removed} dishes. Your credits are unchanged."))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
