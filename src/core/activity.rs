//! Admin reporting over users and the activity log.
//!
//! Read-only: nothing here writes to the ledger. All functions return
//! structured data; the bot layer turns it into embeds.

use crate::{
    core::ledger::{self, LedgerAction, Tier},
    entities::{ActivityLog, User, activity_log, user},
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, QueryOrder, QuerySelect, prelude::*};

/// Default number of log entries returned
pub const DEFAULT_LOG_LIMIT: u64 = 20;

/// Filter for [`list_logs`]
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Only entries of this user
    pub user_id: Option<String>,
    /// Only entries of this action
    pub action: Option<LedgerAction>,
    /// Only entries at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of entries, defaults to [`DEFAULT_LOG_LIMIT`]
    pub limit: Option<u64>,
}

/// Lists activity log entries, newest first.
///
/// # Arguments
/// * `db` - Database connection
/// * `filter` - Optional user / action / time constraints and a row limit
pub async fn list_logs(
    db: &DatabaseConnection,
    filter: &LogFilter,
) -> Result<Vec<activity_log::Model>> {
    let mut query = ActivityLog::find();
    if let Some(user_id) = &filter.user_id {
        query = query.filter(activity_log::Column::UserId.eq(user_id.as_str()));
    }
    if let Some(action) = filter.action {
        query = query.filter(activity_log::Column::Action.eq(action.as_str()));
    }
    if let Some(since) = filter.since {
        query = query.filter(activity_log::Column::Timestamp.gte(since));
    }

    query
        .order_by_desc(activity_log::Column::Timestamp)
        .order_by_desc(activity_log::Column::Id)
        .limit(filter.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists users whose name, email or id contains `search` (case-insensitive),
/// sorted by display name.
pub async fn list_users(db: &DatabaseConnection, search: Option<&str>) -> Result<Vec<user::Model>> {
    let mut users = User::find()
        .order_by_asc(user::Column::DisplayName)
        .all(db)
        .await?;

    if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        users.retain(|u| {
            u.display_name.to_lowercase().contains(&needle)
                || u.id.contains(&needle)
                || u
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle))
        });
    }
    Ok(users)
}

/// Totals across all users
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSummary {
    /// Registered users
    pub users: u64,
    /// Users on the premium tier
    pub premium_users: u64,
    /// Credits consumed by paid actions
    pub credits_spent: i64,
    /// Credits added through packs
    pub credits_purchased: i64,
    /// Free credits granted by admins
    pub credits_granted: i64,
    /// Images generated, all time
    pub lifetime_generations: i64,
    /// Spendable credits held by users right now
    pub outstanding_balance: i64,
}

/// Summarizes the ledger.
pub async fn summarize(db: &DatabaseConnection) -> Result<UsageSummary> {
    let now = Utc::now();
    let users = User::find().all(db).await?;
    let logs = ActivityLog::find().all(db).await?;

    let mut summary = UsageSummary {
        users: users.len() as u64,
        ..UsageSummary::default()
    };
    for user in &users {
        if ledger::tier_of(user) == Tier::Premium {
            summary.premium_users += 1;
        }
        summary.lifetime_generations += user.lifetime_generations;
        summary.outstanding_balance += ledger::balance(user, now);
    }
    for entry in &logs {
        match entry.action.parse::<LedgerAction>() {
            Ok(action) if action.is_paid() => summary.credits_spent -= entry.credit_delta,
            Ok(LedgerAction::Purchase) => summary.credits_purchased += entry.credit_delta,
            Ok(LedgerAction::Grant) => summary.credits_granted += entry.credit_delta,
            _ => {}
        }
    }
    Ok(summary)
}

/// Formats a signed credit change, e.g. `+10` or `-1`.
#[must_use]
pub fn format_credit_delta(delta: i64) -> String {
    if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}

/// Formats a duration as `5h 12m`, `12m` or `<1m`.
#[must_use]
pub fn format_duration_short(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 1 {
        return "<1m".to_string();
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// One line of the admin log view.
#[must_use]
pub fn format_log_line(entry: &activity_log::Model) -> String {
    format!(
        "`{}` <@{}> **{}** {} ({})",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.user_id,
        entry.action,
        entry.detail,
        format_credit_delta(entry.credit_delta)
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_credit_delta(10), "+10");
        assert_eq!(format_credit_delta(-1), "-1");
        assert_eq!(format_credit_delta(0), "0");
        assert_eq!(format_duration_short(Duration::seconds(30)), "<1m");
        assert_eq!(format_duration_short(Duration::minutes(12)), "12m");
        assert_eq!(format_duration_short(Duration::minutes(312)), "5h 12m");
    }

    #[tokio::test]
    async fn test_list_logs_filters_and_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        create_test_user(&db, "u1", 5, 0).await?;
        create_test_user(&db, "u2", 5, 0).await?;

        ledger::charge(&db, "u1", LedgerAction::Produce, "Soup", &policy).await?;
        ledger::charge(&db, "u1", LedgerAction::Edit, "Soup", &policy).await?;
        ledger::charge(&db, "u2", LedgerAction::Produce, "Steak", &policy).await?;

        let all = list_logs(&db, &LogFilter::default()).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].detail, "Steak");

        let u1 = list_logs(
            &db,
            &LogFilter {
                user_id: Some("u1".to_string()),
                ..LogFilter::default()
            },
        )
        .await?;
        assert_eq!(u1.len(), 2);
        assert_eq!(u1[0].action, "EDIT");

        let produce = list_logs(
            &db,
            &LogFilter {
                action: Some(LedgerAction::Produce),
                limit: Some(1),
                ..LogFilter::default()
            },
        )
        .await?;
        assert_eq!(produce.len(), 1);

        let future = list_logs(
            &db,
            &LogFilter {
                since: Some(Utc::now() + Duration::hours(1)),
                ..LogFilter::default()
            },
        )
        .await?;
        assert!(future.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_users_search() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        ledger::get_or_create_user(&db, "100", "Zoe's Bistro", &policy).await?;
        ledger::get_or_create_user(&db, "200", "Ana Trattoria", &policy).await?;

        let all = list_users(&db, None).await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].display_name, "Ana Trattoria");

        let found = list_users(&db, Some("bistro")).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "100");

        let ordered = list_users(&db, Some("i")).await?;
        let names: Vec<_> = ordered.iter().map(|u| u.display_name.as_str()).collect();
        assert_eq!(names, ["Ana Trattoria", "Zoe's Bistro"]);

        assert_eq!(list_users(&db, Some("20")).await?.len(), 1);
        assert!(list_users(&db, Some("sushi")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_summarize() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = test_policy();
        create_test_user(&db, "u1", 0, 2).await?;
        create_test_user(&db, "u2", 0, 0).await?;

        ledger::charge(&db, "u1", LedgerAction::Produce, "Soup", &policy).await?;
        let pack = policy.find_pack("michelin").unwrap().clone();
        ledger::purchase(&db, "u2", &pack).await?;
        ledger::grant_free_credits(&db, "u2", 4, "admin", &policy).await?;

        let summary = summarize(&db).await?;
        assert_eq!(summary.users, 2);
        assert_eq!(summary.premium_users, 1);
        assert_eq!(summary.credits_spent, 1);
        assert_eq!(summary.credits_purchased, pack.credits);
        assert_eq!(summary.credits_granted, 4);
        assert_eq!(summary.lifetime_generations, 1);
        assert_eq!(summary.outstanding_balance, 1 + pack.credits + 4);
        Ok(())
    }

    #[test]
    fn test_format_log_line() {
        let entry = activity_log::Model {
            id: 1,
            timestamp: Utc::now(),
            user_id: "42".to_string(),
            action: "PURCHASE".to_string(),
            detail: "starter pack (+10)".to_string(),
            credit_delta: 10,
        };
        let line = format_log_line(&entry);
        assert!(line.contains("<@42>"));
        assert!(line.ends_with("(+10)"));
    }
}
