//! User entity - a restaurant owner and their credit balances.
//!
//! Balances are split into purchased credits (never expire) and free credits
//! (granted on sign-up or by an admin, expire at `free_credits_expire_at`).
//! The daily usage counter resets implicitly 24 hours after `last_usage_at`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Discord user ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Name shown in reports
    pub display_name: String,
    /// Optional contact email
    pub email: Option<String>,
    /// Credits bought through credit packs
    pub purchased_credits: i64,
    /// Free credits, spent before purchased ones
    pub free_credits: i64,
    /// When the free credits stop counting, None if they never expire
    pub free_credits_expire_at: Option<DateTimeUtc>,
    /// `"free"` or `"premium"`
    pub tier: String,
    /// Paid actions counted in the current 24h window
    pub daily_usage: i32,
    /// Timestamp of the last paid action, anchors the 24h window
    pub last_usage_at: Option<DateTimeUtc>,
    /// Images generated over the account's lifetime
    pub lifetime_generations: i64,
    /// When the user was first seen
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many activity log entries
    #[sea_orm(has_many = "super::activity_log::Entity")]
    ActivityLogs,
}

impl Related<super::activity_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
