//! Per-user studio state.
//!
//! Each Discord user has one [`Session`]: their dish list, generation
//! settings, chat transcript, playback timeline and dictation buffer. All
//! sessions sit behind a single async mutex. It is held for in-memory
//! bookkeeping and local ledger reads and writes, never across a call to the
//! AI service.

use crate::{
    core::{
        assistant::Conversation,
        audio::PlaybackTimeline,
        dish::{Dish, DishDraft, DishId, PaidOperation, PaidOutput},
        intake::DictationBuffer,
        prompt::GenerationSettings,
    },
    errors::{Error, Result},
    genai::ChatTurn,
};
use std::collections::HashMap;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info};

/// Everything one user is working on
#[derive(Debug, Default)]
pub struct Session {
    /// Dishes in intake order
    pub dishes: Vec<Dish>,
    /// Global generation settings
    pub settings: GenerationSettings,
    /// Paid operations started but not yet finished
    pub pending_paid_ops: u32,
    /// Assistant transcript
    pub conversation: Conversation,
    /// Assistant speech timeline
    pub timeline: PlaybackTimeline,
    /// Dictated menu text
    pub dictation: DictationBuffer,
}

impl Session {
    /// Dish matching a name or id prefix.
    pub fn find_dish(&self, query: &str) -> Result<&Dish> {
        self.dishes
            .iter()
            .find(|d| d.matches(query))
            .ok_or_else(|| Error::DishNotFound {
                dish: query.to_string(),
            })
    }

    /// Mutable dish matching a name or id prefix.
    pub fn find_dish_mut(&mut self, query: &str) -> Result<&mut Dish> {
        self.dishes
            .iter_mut()
            .find(|d| d.matches(query))
            .ok_or_else(|| Error::DishNotFound {
                dish: query.to_string(),
            })
    }

    fn dish_mut(&mut self, id: DishId) -> Result<&mut Dish> {
        self.dishes
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::DishNotFound { dish: id.short() })
    }

    /// Whether the dish is still in the session.
    #[must_use]
    pub fn contains(&self, dish_id: DishId) -> bool {
        self.dishes.iter().any(|d| d.id == dish_id)
    }

    /// Checks that the dish exists and accepts `operation`.
    pub fn ensure_can_begin(&mut self, dish_id: DishId, operation: PaidOperation) -> Result<()> {
        self.dish_mut(dish_id)?.ensure_can_begin(operation)
    }

    /// Marks the dish busy and takes one reservation.
    pub fn begin_paid(&mut self, dish_id: DishId, operation: PaidOperation) -> Result<Dish> {
        let dish = self.dish_mut(dish_id)?;
        dish.begin(operation)?;
        let snapshot = dish.clone();
        self.pending_paid_ops += 1;
        debug!(dish = %snapshot.name, op = operation.verb(), "Paid operation started");
        Ok(snapshot)
    }

    /// Stores the outcome and releases the reservation.
    ///
    /// Returns the updated dish, or None if it was removed by a reset meanwhile.
    pub fn finish_paid(
        &mut self,
        dish_id: DishId,
        outcome: std::result::Result<PaidOutput, String>,
    ) -> Option<Dish> {
        self.pending_paid_ops = self.pending_paid_ops.saturating_sub(1);
        let dish = self.dish_mut(dish_id).ok()?;
        match outcome {
            Ok(output) => dish.succeed(output),
            Err(message) => dish.fail(message),
        }
        Some(dish.clone())
    }
}

/// All user sessions
#[derive(Debug, Default)]
pub struct Studio {
    sessions: Mutex<HashMap<String, Session>>,
}

impl Studio {
    /// Empty studio.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the user's session, creating it if needed.
    pub async fn with_session<R>(&self, user_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.lock(user_id).await;
        f(&mut session)
    }

    /// Appends intake drafts and returns the new dishes.
    pub async fn add_drafts(&self, user_id: &str, drafts: Vec<DishDraft>) -> Vec<Dish> {
        self.with_session(user_id, |session| {
            let added: Vec<Dish> = drafts.into_iter().map(Dish::from_draft).collect();
            session.dishes.extend(added.iter().cloned());
            info!(user_id, added = added.len(), total = session.dishes.len(), "Dishes added");
            added
        })
        .await
    }

    /// Copy of the user's dishes.
    pub async fn snapshot(&self, user_id: &str) -> Vec<Dish> {
        self.with_session(user_id, |session| session.dishes.clone())
            .await
    }

    /// Copy of one dish.
    pub async fn find_dish(&self, user_id: &str, query: &str) -> Result<Dish> {
        self.with_session(user_id, |session| session.find_dish(query).cloned())
            .await
    }

    /// Copy of the user's generation settings.
    pub async fn settings(&self, user_id: &str) -> GenerationSettings {
        self.with_session(user_id, |session| session.settings.clone())
            .await
    }

    /// Changes generation settings.
    pub async fn update_settings(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut GenerationSettings),
    ) -> GenerationSettings {
        self.with_session(user_id, |session| {
            f(&mut session.settings);
            session.settings.clone()
        })
        .await
    }

    /// Changes one dish that is not busy.
    pub async fn update_dish(
        &self,
        user_id: &str,
        query: &str,
        f: impl FnOnce(&mut Dish),
    ) -> Result<Dish> {
        self.with_session(user_id, |session| {
            let dish = session.find_dish_mut(query)?;
            if dish.status.is_busy() {
                return Err(Error::DishBusy {
                    name: dish.name.clone(),
                    status: dish.status.to_string(),
                });
            }
            f(dish);
            Ok(dish.clone())
        })
        .await
    }

    /// Locks the user's session, creating it if needed.
    ///
    /// Held while paid operations reserve and settle so the ledger and the
    /// reservation count are read and written together. Never hold it across
    /// a call to the AI service.
    pub async fn lock(&self, user_id: &str) -> MappedMutexGuard<'_, Session> {
        let sessions = self.sessions.lock().await;
        MutexGuard::map(sessions, |sessions| {
            sessions.entry(user_id.to_string()).or_default()
        })
    }

    /// Records the user's question and opens a partial answer.
    ///
    /// Returns the history to send with it, or None while a previous answer
    /// is still streaming.
    pub async fn begin_chat(&self, user_id: &str, message: &str) -> Option<Vec<ChatTurn>> {
        let mut session = self.lock(user_id).await;
        if session.conversation.partial().is_some() {
            return None;
        }
        let history = session.conversation.history().to_vec();
        session.conversation.begin_response(message);
        Some(history)
    }

    /// Commits the streamed answer.
    pub async fn finish_chat(&self, user_id: &str, answer: &str) {
        let mut session = self.lock(user_id).await;
        session.conversation.append_token(answer);
        session.conversation.commit_response();
    }

    /// Drops the partial answer and its question so the user can ask again.
    pub async fn abandon_chat(&self, user_id: &str) {
        self.lock(user_id).await.conversation.discard_partial();
        debug!(user_id, "Chat turn abandoned");
    }

    /// Ids of dishes a batch generation should pick up: not ready and not busy.
    pub async fn pending_generation(&self, user_id: &str) -> Vec<DishId> {
        self.with_session(user_id, |session| {
            session
                .dishes
                .iter()
                .filter(|d| d.image.is_none() && !d.status.is_busy())
                .map(|d| d.id)
                .collect()
        })
        .await
    }

    /// Drops the user's dishes and dictation. In-flight reservations are kept
    /// until their operations finish.
    pub async fn reset(&self, user_id: &str) -> usize {
        self.with_session(user_id, |session| {
            let removed = session.dishes.len();
            session.dishes.clear();
            session.dictation.clear();
            info!(user_id, removed, "Session reset");
            removed
        })
        .await
    }
}
