//! Entity module - SeaORM entity definitions for the ledger tables.
//! Dishes are session state and live in `core::session`, not here.

pub mod activity_log;
pub mod user;

pub use activity_log::{
    Column as ActivityLogColumn, Entity as ActivityLog, Model as ActivityLogModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
