//! Core business logic - framework-agnostic intake, generation, ledger, assistant
//! and reporting operations. Nothing here knows about Discord.

/// Admin reporting over users and the activity log
pub mod activity;
/// Chat transcript, streaming replies and spoken answers
pub mod assistant;
/// PCM and WAV helpers, playback timeline
pub mod audio;
/// Dish record and its state machine
pub mod dish;
/// ZIP export of generated images
pub mod export;
/// Menu intake from text, spreadsheets, photos and dictation
pub mod intake;
/// Credit balances, tiers, daily quota and charges
pub mod ledger;
/// Realtime voice session lifecycle
pub mod live;
/// Paid per-dish operations with charge-on-success
pub mod orchestrator;
/// Generation settings and prompt construction
pub mod prompt;
/// Per-user studio state
pub mod session;
