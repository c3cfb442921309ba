//! Paid per-dish operations with charge-on-success.
//!
//! Every operation follows the same sequence: pre-flight checks under the
//! session lock (dish state, credit balance, daily quota, reservations), one
//! external call with the lock released, then either a ledger charge and the
//! stored result, or the error stored on the dish and nothing charged.

use crate::{
    config::settings::CreditSettings,
    core::{
        dish::{Dish, DishId, PaidOperation, PaidOutput},
        ledger,
        prompt::{build_analysis_prompt, build_edit_instruction, build_generation_prompt},
        session::Studio,
    },
    entities::ActivityLogModel,
    errors::{Error, Result},
    genai::{GenAiClient, GenAiError},
};
use chrono::Utc;
use futures_util::future::join_all;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How a paid operation that passed pre-flight ended
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    /// The call succeeded and one credit was charged
    Succeeded {
        /// Dish after the update
        dish: Dish,
        /// The ledger entry written
        log: ActivityLogModel,
    },
    /// The call (or the charge) failed; nothing was charged
    Failed {
        /// Dish after the update, None if the session was reset meanwhile
        dish: Option<Dish>,
        /// User-facing reason
        error: String,
    },
}

impl OperationOutcome {
    /// Whether a credit was charged.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// What to do once the dish is reserved
enum Job {
    Generate,
    Edit(String),
    Analyze,
}

impl Job {
    const fn operation(&self) -> PaidOperation {
        match self {
            Self::Generate => PaidOperation::Generate,
            Self::Edit(_) => PaidOperation::Edit,
            Self::Analyze => PaidOperation::Analyze,
        }
    }
}

/// Runs paid operations for all users.
#[derive(Clone)]
pub struct Orchestrator {
    db: DatabaseConnection,
    studio: Arc<Studio>,
    genai: Arc<dyn GenAiClient>,
    policy: CreditSettings,
}

impl Orchestrator {
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        db: DatabaseConnection,
        studio: Arc<Studio>,
        genai: Arc<dyn GenAiClient>,
        policy: CreditSettings,
    ) -> Self {
        Self {
            db,
            studio,
            genai,
            policy,
        }
    }

    /// Generates an image for one dish.
    pub async fn generate(
        &self,
        user_id: &str,
        display_name: &str,
        dish_id: DishId,
    ) -> Result<OperationOutcome> {
        self.run(user_id, display_name, dish_id, Job::Generate).await
    }

    /// Applies a prompt-guided edit to a dish's image.
    pub async fn edit(
        &self,
        user_id: &str,
        display_name: &str,
        dish_id: DishId,
        instruction: &str,
    ) -> Result<OperationOutcome> {
        let instruction = build_edit_instruction(instruction)?;
        self.run(user_id, display_name, dish_id, Job::Edit(instruction))
            .await
    }

    /// Produces nutrition and plating feedback for a dish's image.
    pub async fn analyze(
        &self,
        user_id: &str,
        display_name: &str,
        dish_id: DishId,
    ) -> Result<OperationOutcome> {
        self.run(user_id, display_name, dish_id, Job::Analyze).await
    }

    /// Generates every dish that has no image and is not busy, concurrently.
    ///
    /// Each entry is independent: a refusal or failure for one dish never
    /// affects the others.
    pub async fn generate_all(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Vec<(DishId, Result<OperationOutcome>)> {
        let ids = self.studio.pending_generation(user_id).await;
        info!(user_id, dishes = ids.len(), "Generating all dishes");
        let runs = ids.into_iter().map(|id| async move {
            (id, self.generate(user_id, display_name, id).await)
        });
        join_all(runs).await
    }

    #[instrument(skip(self, job), fields(op = job.operation().verb()))]
    async fn run(
        &self,
        user_id: &str,
        display_name: &str,
        dish_id: DishId,
        job: Job,
    ) -> Result<OperationOutcome> {
        let operation = job.operation();

        let (dish, settings) = {
            let mut session = self.studio.lock(user_id).await;
            session.ensure_can_begin(dish_id, operation)?;
            let user =
                ledger::get_or_create_user(&self.db, user_id, display_name, &self.policy).await?;
            ledger::ensure_can_spend(&user, &self.policy, Utc::now(), session.pending_paid_ops)
                .inspect_err(|e| warn!(user_id, "Paid operation refused: {e}"))?;
            let dish = session.begin_paid(dish_id, operation)?;
            (dish, session.settings.clone())
        };

        let call = match (&job, &dish.image) {
            (Job::Generate, _) => {
                let request = build_generation_prompt(&dish, &settings);
                self.genai.generate_image(&request).await.map(PaidOutput::Image)
            }
            (Job::Edit(instruction), Some(image)) => self
                .genai
                .edit_image(image, instruction)
                .await
                .map(PaidOutput::Image),
            (Job::Analyze, Some(image)) => self
                .genai
                .analyze_image(image, build_analysis_prompt())
                .await
                .map(PaidOutput::Analysis),
            (_, None) => Err(GenAiError::InvalidResponse(format!(
                "{} has no image",
                dish.name
            ))),
        };

        // charge and release under one lock so balance and reservations agree
        let mut session = self.studio.lock(user_id).await;
        let output = match call {
            Ok(output) => output,
            Err(e) => {
                error!(user_id, dish = %dish.name, "External call failed: {e}");
                let error = e.to_string();
                let dish = session.finish_paid(dish_id, Err(error.clone()));
                return Ok(OperationOutcome::Failed { dish, error });
            }
        };

        if !session.contains(dish_id) {
            warn!(user_id, dish = %dish.name, "Dish removed while in flight, nothing charged");
            session.finish_paid(dish_id, Err(String::new()));
            return Ok(OperationOutcome::Failed {
                dish: None,
                error: format!("{} was removed before it finished", dish.name),
            });
        }

        let charged = ledger::charge(
            &self.db,
            user_id,
            operation.ledger_action(),
            &dish.name,
            &self.policy,
        )
        .await;

        match charged {
            Ok(log) => {
                let updated = session.finish_paid(dish_id, Ok(output));
                drop(session);
                info!(user_id, dish = %dish.name, action = %log.action, "Paid operation succeeded");
                updated
                    .map(|dish| OperationOutcome::Succeeded { dish, log })
                    .ok_or(Error::DishNotFound { dish: dish.name })
            }
            Err(e) => {
                // the result is withheld when it cannot be paid for
                warn!(user_id, dish = %dish.name, "Charge refused after success: {e}");
                let error = e.to_string();
                let dish = session.finish_paid(dish_id, Err(error.clone()));
                Ok(OperationOutcome::Failed { dish, error })
            }
        }
    }
}
