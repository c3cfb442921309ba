//! Activity log entity - one row per charge-worthy event.
//!
//! Rows are only ever inserted. `credit_delta` is negative for paid actions
//! (`PRODUCE`, `EDIT`, `ANALYZE`) and positive for `PURCHASE` and `GRANT`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_logs")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// When the event happened
    pub timestamp: DateTimeUtc,
    /// Discord user ID of the actor
    pub user_id: String,
    /// Action kind, see `core::ledger::LedgerAction`
    pub action: String,
    /// Free-text detail (dish name, pack name, ...)
    pub detail: String,
    /// Signed credit change
    pub credit_delta: i64,
}

/// Defines relationships between ActivityLog and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
