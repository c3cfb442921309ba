//! Admin configuration loaded from environment variables.
//!
//! `ADMIN_USER_IDS` holds a comma-separated list of Discord user IDs that may
//! use the `/admin` commands. Unset or empty means nobody is an admin.

use std::collections::HashSet;

/// Parses a comma-separated id list, ignoring blanks and surrounding whitespace.
#[must_use]
pub fn parse_admin_ids(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Gets the configured admin ids from `ADMIN_USER_IDS`.
#[must_use]
pub fn get_admin_ids() -> HashSet<String> {
    std::env::var("ADMIN_USER_IDS")
        .map(|raw| parse_admin_ids(&raw))
        .unwrap_or_default()
}

/// Whether the given Discord user id is an admin.
#[must_use]
pub fn is_admin(user_id: &str) -> bool {
    get_admin_ids().contains(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        let ids = parse_admin_ids(" 123 ,456,, 789 ");
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("123"));
        assert!(ids.contains("456"));
        assert!(ids.contains("789"));
    }

    #[test]
    fn test_parse_admin_ids_empty() {
        assert!(parse_admin_ids("").is_empty());
        assert!(parse_admin_ids(" , ").is_empty());
    }
}
