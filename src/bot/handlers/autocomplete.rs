//! Autocomplete handlers for Discord slash command parameters.
//!
//! Dish names come from the caller's session; every other list is static or
//! comes from the configuration.

use crate::{
    bot::BotData,
    core::{
        ledger::{LedgerAction, Tier},
        prompt::{AspectRatio, ImageSize, Quality, Style},
    },
    errors::Error,
};

/// Discord autocomplete limit
const MAX_CHOICES: usize = 25;

/// Options containing `partial` (case-insensitive), in the given order.
#[must_use]
pub fn filter_choices<I, S>(options: I, partial: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let partial_lower = partial.trim().to_lowercase();
    options
        .into_iter()
        .map(Into::into)
        .filter(|option| option.to_lowercase().contains(&partial_lower))
        .take(MAX_CHOICES)
        .collect()
}

/// Provides autocomplete suggestions for the caller's dish names.
///
/// # Arguments
/// * `ctx` - The poise context holding the studio
/// * `partial` - The partial string the user has typed so far
///
/// # Returns
/// Dish names in intake order that match the partial input
pub async fn autocomplete_dish_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let user_id = ctx.author().id.to_string();
    let dishes = ctx.data().studio.snapshot(&user_id).await;
    filter_choices(dishes.into_iter().map(|d| d.name), partial)
}

/// Photographic styles.
pub async fn autocomplete_style(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices(Style::ALL.iter().map(|s| s.label()), partial)
}

/// Quality levels.
pub async fn autocomplete_quality(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices(Quality::ALL.iter().map(|q| q.label()), partial)
}

/// Output sizes.
pub async fn autocomplete_size(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices(ImageSize::ALL.iter().map(|s| s.label()), partial)
}

/// Aspect ratios.
pub async fn autocomplete_aspect_ratio(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices(AspectRatio::ALL.iter().map(|a| a.label()), partial)
}

/// Configured credit pack names.
pub async fn autocomplete_credit_pack(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let packs = &ctx.data().config.credits.packs;
    filter_choices(packs.iter().map(|p| p.name.as_str()), partial)
}

/// Configured magic prompt names.
pub async fn autocomplete_magic_prompt(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let prompts = &ctx.data().config.magic_prompts;
    filter_choices(prompts.iter().map(|p| p.name.as_str()), partial)
}

/// Activity log action names.
pub async fn autocomplete_ledger_action(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices(LedgerAction::ALL.iter().map(|a| a.as_str()), partial)
}

/// Account tiers.
pub async fn autocomplete_tier(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    filter_choices([Tier::Free, Tier::Premium].map(Tier::as_str), partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_choices_case_insensitive() {
        let styles = filter_choices(Style::ALL.iter().map(|s| s.label()), "mood");
        assert_eq!(styles, vec!["Dark & Moody".to_string()]);

        let all = filter_choices(Quality::ALL.iter().map(|q| q.label()), "");
        assert_eq!(all.len(), Quality::ALL.len());
    }

    #[test]
    fn test_filter_choices_caps_at_discord_limit() {
        let many = (0..40).map(|i| format!("Dish {i}"));
        assert_eq!(filter_choices(many, "dish").len(), MAX_CHOICES);
    }
}
