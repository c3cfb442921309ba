//! Reply helpers shared by the command modules.

use crate::{
    bot::Context,
    core::{
        dish::{Dish, DishStatus},
        intake::PhotoUpload,
        orchestrator::OperationOutcome,
    },
    errors::Result,
};
use poise::serenity_prelude as serenity;
use std::fmt::Write;

/// Discord's message length limit
pub const MESSAGE_LIMIT: usize = 2_000;

/// Caller's Discord id and display name.
pub fn author(ctx: Context<'_>) -> (String, String) {
    let user = ctx.author();
    (user.id.to_string(), user.display_name().to_string())
}

/// Downloads a Discord attachment.
pub async fn download(attachment: &serenity::Attachment) -> Result<PhotoUpload> {
    let data = attachment.download().await?;
    Ok(PhotoUpload {
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone(),
        data,
    })
}

/// Cuts `text` to the message limit on a character boundary.
#[must_use]
pub fn truncate_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut end = MESSAGE_LIMIT - 1;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

const fn status_emoji(status: DishStatus) -> &'static str {
    match status {
        DishStatus::Empty => "⬜",
        DishStatus::Generating | DishStatus::Editing | DishStatus::Analyzing => "⏳",
        DishStatus::Ready => "✅",
        DishStatus::Failed => "❌",
    }
}

/// One line of the dish list.
pub fn dish_line(dish: &Dish) -> Result<String> {
    let mut line = format!(
        "{} **{}** `{}` {}",
        status_emoji(dish.status),
        dish.name,
        dish.id.short(),
        dish.status
    );
    if dish.reference_image.is_some() {
        line.push_str(if dish.reference_locked {
            " 📌 reference (locked)"
        } else {
            " 📷 reference"
        });
    }
    if !dish.magic_prompts.is_empty() {
        write!(line, " ✨{}", dish.magic_prompts.len())?;
    }
    if let Some(error) = &dish.error {
        write!(line, "\n   └ {error}")?;
    }
    Ok(line)
}

/// Reply showing a dish, with its image attached when it has one.
pub fn dish_reply(dish: &Dish, headline: &str) -> poise::CreateReply {
    let mut embed = serenity::CreateEmbed::default()
        .title(format!("{headline} {}", dish.name))
        .color(0x00C9_A227)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} · {}",
            dish.id.short(),
            dish.status
        )));
    if !dish.description.is_empty() {
        embed = embed.description(dish.full_description());
    }
    if let Some(nutrition) = &dish.nutrition {
        embed = embed.field("Analysis", truncate_field(nutrition), false);
    }
    if let Some(error) = &dish.error {
        embed = embed.field("Error", truncate_field(error), false);
    }

    let mut reply = poise::CreateReply::default();
    if let Some(image) = &dish.image {
        let filename = format!("{}.{}", dish.id.short(), image.extension());
        embed = embed.attachment(filename.clone());
        reply = reply.attachment(serenity::CreateAttachment::bytes(image.data.clone(), filename));
    }
    reply.embed(embed)
}

fn truncate_field(text: &str) -> String {
    const FIELD_LIMIT: usize = 1_024;
    if text.len() <= FIELD_LIMIT {
        return text.to_string();
    }
    let mut end = FIELD_LIMIT - 1;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

/// Reply describing a finished paid operation.
pub fn outcome_reply(outcome: &OperationOutcome, verb: &str) -> poise::CreateReply {
    match outcome {
        OperationOutcome::Succeeded { dish, .. } => dish_reply(dish, &format!("✅ {verb}:")),
        OperationOutcome::Failed {
            dish: Some(dish), ..
        } => dish_reply(dish, "❌ Failed:").content("No credit was charged."),
        OperationOutcome::Failed { dish: None, error } => {
            poise::CreateReply::default().content(format!("❌ {error}. No credit was charged."))
        }
    }
}
