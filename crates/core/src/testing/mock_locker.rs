//! Mock unit locker for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::inventory::{InventoryUnit, LockAttempt, LockError, LockOutcome, UnitLocker};
use crate::session::SessionCredential;

/// Mock implementation of the `UnitLocker` trait.
///
/// Outcomes are scripted per unit id (consumed in order), with a default
/// for unscripted units. Every attempted unit id is recorded, which is how
/// the "conflict never retries the same unit" property is asserted.
pub struct MockUnitLocker {
    scripts: Arc<RwLock<HashMap<String, VecDeque<LockOutcome>>>>,
    default_outcome: Arc<RwLock<LockOutcome>>,
    next_error: Arc<RwLock<Option<LockError>>>,
    attempts: Arc<RwLock<Vec<String>>>,
    sessions: Arc<RwLock<Vec<String>>>,
}

impl Default for MockUnitLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUnitLocker {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(RwLock::new(HashMap::new())),
            default_outcome: Arc::new(RwLock::new(LockOutcome::Locked)),
            next_error: Arc::new(RwLock::new(None)),
            attempts: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the outcomes for one unit id, consumed in order.
    pub async fn script_unit(&self, unit_id: &str, outcomes: Vec<LockOutcome>) {
        self.scripts
            .write()
            .await
            .insert(unit_id.to_string(), outcomes.into());
    }

    /// Outcome for unscripted units (default: `Locked`).
    pub async fn set_default_outcome(&self, outcome: LockOutcome) {
        *self.default_outcome.write().await = outcome;
    }

    /// Configure the next try_lock call to fail with a transport error.
    pub async fn set_next_error(&self, error: LockError) {
        *self.next_error.write().await = Some(error);
    }

    /// Unit ids attempted, in call order.
    pub async fn recorded_attempts(&self) -> Vec<String> {
        self.attempts.read().await.clone()
    }

    /// Session ids observed, in call order.
    pub async fn recorded_session_ids(&self) -> Vec<String> {
        self.sessions.read().await.clone()
    }
}

#[async_trait]
impl UnitLocker for MockUnitLocker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn try_lock(
        &self,
        unit: &InventoryUnit,
        cred: &SessionCredential,
    ) -> Result<LockAttempt, LockError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.attempts.write().await.push(unit.unit_id.clone());
        self.sessions.write().await.push(cred.session_id.clone());

        let scripted = self
            .scripts
            .write()
            .await
            .get_mut(&unit.unit_id)
            .and_then(|queue| queue.pop_front());
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => *self.default_outcome.read().await,
        };

        let error_code = match outcome {
            LockOutcome::Locked => None,
            LockOutcome::Conflict => Some("SEAT_TAKEN".to_string()),
            LockOutcome::Rejected => Some("SESSION_EXPIRED".to_string()),
        };

        Ok(LockAttempt {
            unit_id: unit.unit_id.clone(),
            outcome,
            error_code,
        })
    }
}
