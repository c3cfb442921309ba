//! Admin Discord commands - user search, activity logs, grants and tiers.
//!
//! Only ids listed in `ADMIN_USER_IDS` may run them.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::autocomplete,
            util::{self, author},
        },
        config::admins,
        core::{
            activity::{self, LogFilter},
            ledger::{self, LedgerAction, Tier},
        },
        errors::{Error, Result},
    };
    use chrono::{Duration, Utc};
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;
    use tracing::{info, warn};

    /// Rejects callers that are not admins.
    async fn admin_check(ctx: poise::Context<'_, BotData, Error>) -> Result<bool> {
        let (user_id, _) = author(ctx);
        if admins::is_admin(&user_id) {
            return Ok(true);
        }
        warn!(user_id, command = %ctx.command().qualified_name, "Admin command refused");
        ctx.send(
            poise::CreateReply::default()
                .content("⛔ This command is for admins only.")
                .ephemeral(true),
        )
        .await?;
        Ok(false)
    }

    /// Studio administration.
    #[poise::command(
        slash_command,
        check = "admin_check",
        subcommands("admin_users", "admin_logs", "admin_grant", "admin_tier", "admin_summary")
    )]
    pub async fn admin(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Admin commands:\n\
            `/admin users` - Search users and balances\n\
            `/admin logs` - Browse the activity log\n\
            `/admin grant` - Grant free credits\n\
            `/admin tier` - Change a user's tier\n\
            `/admin summary` - Totals across all users";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Lists users with their balances.
    #[poise::command(slash_command, rename = "users", check = "admin_check")]
    pub async fn admin_users(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name, email or id to search for"] search: Option<String>,
    ) -> Result<()> {
        let users = activity::list_users(&ctx.data().database, search.as_deref()).await?;
        if users.is_empty() {
            ctx.say("👥 No matching users.").await?;
            return Ok(());
        }

        let now = Utc::now();
        let mut response = format!("👥 **Users** ({})\n", users.len());
        for user in &users {
            writeln!(
                response,
                "• **{}** <@{}> {} · balance {} ({} free) · {}/{} today · {} photos",
                user.display_name,
                user.id,
                ledger::tier_of(user).as_str(),
                ledger::balance(user, now),
                ledger::effective_free_credits(user, now),
                ledger::daily_usage(user, now),
                ledger::tier_of(user).daily_limit(&ctx.data().config.credits),
                user.lifetime_generations
            )?;
        }
        ctx.send(
            poise::CreateReply::default()
                .content(util::truncate_message(&response))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Shows recent activity, newest first.
    #[poise::command(slash_command, rename = "logs", check = "admin_check")]
    pub async fn admin_logs(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only this user"] user: Option<serenity::User>,
        #[description = "Only this action"]
        #[autocomplete = "autocomplete::autocomplete_ledger_action"]
        action: Option<String>,
        #[description = "Number of entries (default 20)"]
        #[min = 1]
        #[max = 100]
        limit: Option<u64>,
        #[description = "Only the last N hours"]
        #[min = 1]
        hours: Option<i64>,
    ) -> Result<()> {
        let filter = LogFilter {
            user_id: user.map(|u| u.id.to_string()),
            action: action.map(|a| a.parse::<LedgerAction>()).transpose()?,
            since: hours.map(|h| Utc::now() - Duration::hours(h)),
            limit,
        };

        let entries = activity::list_logs(&ctx.data().database, &filter).await?;
        let response = if entries.is_empty() {
            "📜 No matching activity.".to_string()
        } else {
            let mut response = format!("📜 **Activity** ({} entries)\n", entries.len());
            for entry in &entries {
                writeln!(response, "{}", activity::format_log_line(entry))?;
            }
            util::truncate_message(&response)
        };
        ctx.send(
            poise::CreateReply::default()
                .content(response)
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Grants free credits to a user.
    #[poise::command(slash_command, rename = "grant", check = "admin_check")]
    pub async fn admin_grant(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Recipient"] user: serenity::User,
        #[description = "Free credits to add"]
        #[min = 1]
        amount: i64,
    ) -> Result<()> {
        let (admin_id, admin_name) = author(ctx);
        let data = ctx.data();
        let policy = &data.config.credits;
        let user_id = user.id.to_string();

        ledger::get_or_create_user(&data.database, &user_id, user.display_name(), policy).await?;
        ledger::grant_free_credits(&data.database, &user_id, amount, &admin_name, policy).await?;
        info!(admin_id, user_id, amount, "Admin granted free credits");

        ctx.say(format!(
            "🎁 Granted {amount} free credits to <@{user_id}>. They expire in {} days.",
            policy.free_credit_ttl_days
        ))
        .await?;
        Ok(())
    }

    /// Changes a user's tier.
    #[poise::command(slash_command, rename = "tier", check = "admin_check")]
    pub async fn admin_tier(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "User"] user: serenity::User,
        #[description = "New tier"]
        #[autocomplete = "autocomplete::autocomplete_tier"]
        tier: String,
    ) -> Result<()> {
        let tier = tier.parse::<Tier>()?;
        let data = ctx.data();
        let user_id = user.id.to_string();

        ledger::get_or_create_user(
            &data.database,
            &user_id,
            user.display_name(),
            &data.config.credits,
        )
        .await?;
        let updated = ledger::set_tier(&data.database, &user_id, tier).await?;

        ctx.say(format!(
            "⭐ <@{user_id}> is now on the **{}** tier ({} paid actions per day).",
            tier.as_str(),
            ledger::tier_of(&updated).daily_limit(&data.config.credits)
        ))
        .await?;
        Ok(())
    }

    /// Totals across all users.
    #[poise::command(slash_command, rename = "summary", check = "admin_check")]
    pub async fn admin_summary(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let summary = activity::summarize(&ctx.data().database).await?;

        let embed = serenity::CreateEmbed::default()
            .title("📊 Studio summary")
            .color(0x009B_59B6)
            .field(
                "Users",
                format!("{} ({} premium)", summary.users, summary.premium_users),
                true,
            )
            .field("Photos produced", summary.lifetime_generations.to_string(), true)
            .field("Credits spent", summary.credits_spent.to_string(), true)
            .field("Credits purchased", summary.credits_purchased.to_string(), true)
            .field("Credits granted", summary.credits_granted.to_string(), true)
            .field("Outstanding balance", summary.outstanding_balance.to_string(), true);

        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
