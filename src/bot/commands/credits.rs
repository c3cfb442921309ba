//! Credit Discord commands - balance overview and credit pack purchases.
//!
//! Purchases are simulated: choosing a pack adds its credits right away.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, util::author},
        core::{activity, ledger},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    /// Shows your credit balance, tier and daily usage.
    #[poise::command(slash_command, prefix_command)]
    pub async fn credits(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        let data = ctx.data();
        let policy = &data.config.credits;

        let user = ledger::get_or_create_user(&data.database, &user_id, &display_name, policy)
            .await?;
        let pending = data
            .studio
            .with_session(&user_id, |session| session.pending_paid_ops)
            .await;

        let now = Utc::now();
        let tier = ledger::tier_of(&user);
        let free = ledger::effective_free_credits(&user, now);

        let mut balance = String::new();
        writeln!(balance, "**Total:** {}", ledger::balance(&user, now))?;
        writeln!(balance, "Purchased: {}", user.purchased_credits)?;
        write!(balance, "Free: {free}")?;
        if free > 0
            && let Some(expires) = user.free_credits_expire_at
        {
            write!(balance, " (expire <t:{}:R>)", expires.timestamp())?;
        }
        if pending > 0 {
            write!(balance, "\nIn flight: {pending}")?;
        }

        let mut usage = format!(
            "{}/{} paid actions today",
            ledger::daily_usage(&user, now),
            tier.daily_limit(policy)
        );
        if let Some(remaining) = ledger::time_until_reset(&user, now) {
            write!(
                usage,
                "\nResets in {}",
                activity::format_duration_short(remaining)
            )?;
        }

        let embed = serenity::CreateEmbed::default()
            .title(format!("💳 Credits for {}", user.display_name))
            .color(0x0034_98DB)
            .field("Balance", balance, false)
            .field("Tier", tier.as_str(), true)
            .field("Daily limit", usage, true)
            .field(
                "Photos produced",
                user.lifetime_generations.to_string(),
                true,
            )
            .footer(serenity::CreateEmbedFooter::new(
                "Each photo, edit or analysis costs 1 credit, charged only on success",
            ));

        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Buys a credit pack.
    #[poise::command(slash_command)]
    pub async fn buy(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Credit pack"]
        #[autocomplete = "autocomplete::autocomplete_credit_pack"]
        pack: String,
    ) -> Result<()> {
        let (user_id, display_name) = author(ctx);
        let data = ctx.data();
        let policy = &data.config.credits;

        let Some(pack) = policy.find_pack(&pack) else {
            let names: Vec<&str> = policy.packs.iter().map(|p| p.name.as_str()).collect();
            ctx.say(format!(
                "❌ Unknown pack '{pack}'. Available: {}",
                names.join(", ")
            ))
            .await?;
            return Ok(());
        };

        ledger::get_or_create_user(&data.database, &user_id, &display_name, policy).await?;
        let entry = ledger::purchase(&data.database, &user_id, pack).await?;
        let user = ledger::get_user(&data.database, &user_id)
            .await?
            .ok_or_else(|| Error::UserNotFound {
                user_id: user_id.clone(),
            })?;

        let mut response = format!(
            "🛒 **{}** pack added: {} credits. Balance: {}",
            pack.name,
            activity::format_credit_delta(entry.credit_delta),
            ledger::balance(&user, Utc::now())
        );
        if pack.grants_premium {
            response.push_str("\n⭐ You are now on the premium tier.");
        }
        ctx.say(response).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
