//! Credit ledger business logic - balances, tiers, daily quota and charges.
//!
//! Two independent gates protect every paid action: the credit balance must be
//! positive and the tier's daily ceiling must not be reached. Both are checked
//! before the external call (`ensure_can_spend`) and again inside the charging
//! transaction (`charge`), which is the only place a negative ledger delta is
//! written. The daily counter is never reset by a job: once 24 hours have passed
//! since `last_usage_at`, `daily_usage` simply reads as zero.

use crate::{
    config::settings::{CreditPackConfig, CreditSettings},
    entities::{ActivityLog, User, activity_log, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, Set, TransactionTrait, prelude::*};
use std::{fmt, str::FromStr};

/// Length of the rolling usage window
pub const QUOTA_WINDOW_HOURS: i64 = 24;

/// Kind of charge-worthy event written to the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    /// Image generation
    Produce,
    /// Image edit
    Edit,
    /// Image analysis
    Analyze,
    /// Credit pack purchase
    Purchase,
    /// Free credits granted by an admin
    Grant,
}

impl LedgerAction {
    /// All actions, in display order.
    pub const ALL: [Self; 5] = [
        Self::Produce,
        Self::Edit,
        Self::Analyze,
        Self::Purchase,
        Self::Grant,
    ];

    /// Stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Produce => "PRODUCE",
            Self::Edit => "EDIT",
            Self::Analyze => "ANALYZE",
            Self::Purchase => "PURCHASE",
            Self::Grant => "GRANT",
        }
    }

    /// Whether the action consumes a credit.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Produce | Self::Edit | Self::Analyze)
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config {
                message: format!("Unknown ledger action '{s}'"),
            })
    }
}

/// Account tier, sets the daily ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Default tier
    Free,
    /// Upgraded tier
    Premium,
}

impl Tier {
    /// Stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// Paid actions allowed per rolling window.
    #[must_use]
    pub const fn daily_limit(self, policy: &CreditSettings) -> i32 {
        match self {
            Self::Free => policy.free_daily_limit,
            Self::Premium => policy.premium_daily_limit,
        }
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(Error::Config {
                message: format!("Unknown tier '{other}'"),
            }),
        }
    }
}

/// Tier of a stored user; unknown values read as free.
#[must_use]
pub fn tier_of(user: &user::Model) -> Tier {
    user.tier.parse().unwrap_or(Tier::Free)
}

/// Free credits that still count at `now`.
#[must_use]
pub fn effective_free_credits(user: &user::Model, now: DateTime<Utc>) -> i64 {
    match user.free_credits_expire_at {
        Some(expires) if expires <= now => 0,
        _ => user.free_credits.max(0),
    }
}

/// Spendable balance: purchased credits plus unexpired free credits.
#[must_use]
pub fn balance(user: &user::Model, now: DateTime<Utc>) -> i64 {
    user.purchased_credits.max(0) + effective_free_credits(user, now)
}

/// Whether the user has at least one spendable credit.
#[must_use]
pub fn can_afford(user: &user::Model, now: DateTime<Utc>) -> bool {
    balance(user, now) > 0
}

/// Paid actions counted in the current window; zero once the window has elapsed.
#[must_use]
pub fn daily_usage(user: &user::Model, now: DateTime<Utc>) -> i32 {
    match user.last_usage_at {
        Some(last) if now < last + Duration::hours(QUOTA_WINDOW_HOURS) => user.daily_usage,
        _ => 0,
    }
}

/// Time left until the daily counter reads zero again, None if it already does.
#[must_use]
pub fn time_until_reset(user: &user::Model, now: DateTime<Utc>) -> Option<Duration> {
    let last = user.last_usage_at?;
    let remaining = last + Duration::hours(QUOTA_WINDOW_HOURS) - now;
    (remaining > Duration::zero()).then_some(remaining)
}

/// Checks both gates, counting `pending` operations already reserved.
///
/// # Errors
/// `InsufficientCredits` when no credit is left after reservations,
/// `DailyQuotaExceeded` when the tier ceiling would be passed.
pub fn ensure_can_spend(
    user: &user::Model,
    policy: &CreditSettings,
    now: DateTime<Utc>,
    pending: u32,
) -> Result<()> {
    let pending = i64::from(pending);
    let available = balance(user, now);
    if available - pending <= 0 {
        return Err(Error::InsufficientCredits { balance: available });
    }

    let limit = tier_of(user).daily_limit(policy);
    let used = i64::from(daily_usage(user, now)) + pending;
    if used >= i64::from(limit) {
        return Err(Error::DailyQuotaExceeded {
            used: i32::try_from(used).unwrap_or(i32::MAX),
            limit,
        });
    }

    Ok(())
}

/// Finds a user by Discord id.
pub async fn get_user<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the user, creating it with the sign-up free credits on first sight.
pub async fn get_or_create_user(
    db: &DatabaseConnection,
    user_id: &str,
    display_name: &str,
    policy: &CreditSettings,
) -> Result<user::Model> {
    if let Some(existing) = get_user(db, user_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let new_user = user::ActiveModel {
        id: Set(user_id.to_string()),
        display_name: Set(display_name.trim().to_string()),
        email: Set(None),
        purchased_credits: Set(0),
        free_credits: Set(policy.starting_free_credits),
        free_credits_expire_at: Set(Some(now + Duration::days(policy.free_credit_ttl_days))),
        tier: Set(Tier::Free.as_str().to_string()),
        daily_usage: Set(0),
        last_usage_at: Set(None),
        lifetime_generations: Set(0),
        created_at: Set(now),
    };

    let created = new_user.insert(db).await?;
    tracing::info!(
        user_id,
        free_credits = policy.starting_free_credits,
        "Created user"
    );
    Ok(created)
}

async fn insert_log<C>(
    db: &C,
    user_id: &str,
    action: LedgerAction,
    detail: &str,
    credit_delta: i64,
    timestamp: DateTime<Utc>,
) -> Result<activity_log::Model>
where
    C: ConnectionTrait,
{
    let entry = activity_log::ActiveModel {
        timestamp: Set(timestamp),
        user_id: Set(user_id.to_string()),
        action: Set(action.as_str().to_string()),
        detail: Set(detail.to_string()),
        credit_delta: Set(credit_delta),
        ..Default::default()
    };
    entry.insert(db).await.map_err(Into::into)
}

/// Charges one credit for a paid action that has already succeeded.
///
/// Runs in one transaction: re-checks both gates, spends unexpired free credits
/// before purchased ones, advances the daily counter (restarting it when the
/// window has elapsed), bumps the lifetime count for `PRODUCE`, and appends one
/// log entry with delta -1.
pub async fn charge(
    db: &DatabaseConnection,
    user_id: &str,
    action: LedgerAction,
    detail: &str,
    policy: &CreditSettings,
) -> Result<activity_log::Model> {
    if !action.is_paid() {
        return Err(Error::Config {
            message: format!("{action} is not a paid action"),
        });
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let user = get_user(&txn, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?;

    ensure_can_spend(&user, policy, now, 0)?;

    let free_left = effective_free_credits(&user, now);
    let (free_credits, purchased_credits) = if free_left > 0 {
        (free_left - 1, user.purchased_credits)
    } else {
        (0, user.purchased_credits - 1)
    };
    let daily = daily_usage(&user, now) + 1;
    let lifetime = if action == LedgerAction::Produce {
        user.lifetime_generations + 1
    } else {
        user.lifetime_generations
    };

    let mut active: user::ActiveModel = user.into();
    active.free_credits = Set(free_credits);
    active.purchased_credits = Set(purchased_credits);
    active.daily_usage = Set(daily);
    active.last_usage_at = Set(Some(now));
    active.lifetime_generations = Set(lifetime);
    active.update(&txn).await?;

    let entry = insert_log(&txn, user_id, action, detail, -1, now).await?;
    txn.commit().await?;

    tracing::info!(user_id, %action, detail, "Charged one credit");
    Ok(entry)
}

/// Adds a credit pack to the purchased balance.
pub async fn purchase(
    db: &DatabaseConnection,
    user_id: &str,
    pack: &CreditPackConfig,
) -> Result<activity_log::Model> {
    if pack.credits <= 0 {
        return Err(Error::InvalidAmount {
            amount: pack.credits,
        });
    }

    let txn = db.begin().await?;
    let user = get_user(&txn, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?;

    let purchased = user.purchased_credits + pack.credits;
    let mut active: user::ActiveModel = user.into();
    active.purchased_credits = Set(purchased);
    if pack.grants_premium {
        active.tier = Set(Tier::Premium.as_str().to_string());
    }
    active.update(&txn).await?;

    let detail = format!("{} pack (+{})", pack.name, pack.credits);
    let entry = insert_log(
        &txn,
        user_id,
        LedgerAction::Purchase,
        &detail,
        pack.credits,
        Utc::now(),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(user_id, pack = %pack.name, credits = pack.credits, "Credit pack purchased");
    Ok(entry)
}

/// Grants free credits (admin action) and restarts their expiry clock.
///
/// Free credits that already expired are dropped before the grant is added.
pub async fn grant_free_credits(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    granted_by: &str,
    policy: &CreditSettings,
) -> Result<activity_log::Model> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    let now = Utc::now();
    let user = get_user(&txn, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?;

    let free = effective_free_credits(&user, now) + amount;
    let mut active: user::ActiveModel = user.into();
    active.free_credits = Set(free);
    active.free_credits_expire_at = Set(Some(now + Duration::days(policy.free_credit_ttl_days)));
    active.update(&txn).await?;

    let detail = format!("granted by {granted_by}");
    let entry = insert_log(&txn, user_id, LedgerAction::Grant, &detail, amount, now).await?;
    txn.commit().await?;

    tracing::info!(user_id, amount, granted_by, "Free credits granted");
    Ok(entry)
}

/// Changes a user's tier.
pub async fn set_tier(db: &DatabaseConnection, user_id: &str, tier: Tier) -> Result<user::Model> {
    let user = get_user(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?;

    let mut active: user::ActiveModel = user.into();
    active.tier = Set(tier.as_str().to_string());
    let updated = active.update(db).await?;
    tracing::info!(user_id, tier = tier.as_str(), "Tier changed");
    Ok(updated)
}

/// Number of log entries for a user, used by tests and reports.
pub async fn count_entries(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    ActivityLog::find()
        .filter(activity_log::Column::UserId.eq(user_id))
        .count(db)
        .await
        .map_err(Into::into)
}
