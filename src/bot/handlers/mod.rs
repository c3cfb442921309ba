//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete.

/// Autocomplete handlers for dish names, settings, packs, magic prompts and ledger actions
pub mod autocomplete;
