//! Mock session bridge for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bridge::{BridgeError, BridgeOutcome, SessionBridge};
use crate::flow::{FlowBudget, FlowContext};
use crate::session::SessionCredential;

/// Mock implementation of the `SessionBridge` trait.
///
/// Returns a configurable outcome and records the session id of every
/// establish call, which is how session-id stability across phases is
/// asserted in flow tests.
pub struct MockSessionBridge {
    outcome: Arc<RwLock<BridgeOutcome>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockSessionBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionBridge {
    pub fn new() -> Self {
        Self {
            outcome: Arc::new(RwLock::new(BridgeOutcome::Established)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the outcome returned by subsequent establish calls.
    pub async fn set_outcome(&self, outcome: BridgeOutcome) {
        *self.outcome.write().await = outcome;
    }

    /// Session ids observed, in call order.
    pub async fn recorded_session_ids(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl SessionBridge for MockSessionBridge {
    fn name(&self) -> &str {
        "mock"
    }

    async fn establish(
        &self,
        cred: &SessionCredential,
        budget: &FlowBudget,
        ctx: &mut FlowContext,
    ) -> Result<BridgeOutcome, BridgeError> {
        budget.checkpoint()?;
        self.calls.write().await.push(cred.session_id.clone());

        let outcome = *self.outcome.read().await;
        if let BridgeOutcome::Degraded { status } = outcome {
            ctx.mark_degraded(format!("mock handshake degraded (status {:?})", status));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_session_ids() {
        let bridge = MockSessionBridge::new();
        let budget = FlowBudget::new(Duration::from_secs(5));
        let mut ctx = FlowContext::new();

        let outcome = bridge
            .establish(&fixtures::credential("G1_S1"), &budget, &mut ctx)
            .await
            .unwrap();

        assert_eq!(outcome, BridgeOutcome::Established);
        assert_eq!(bridge.recorded_session_ids().await, vec!["G1_S1"]);
        assert!(!ctx.is_degraded());
    }

    #[tokio::test]
    async fn test_degraded_outcome_marks_context() {
        let bridge = MockSessionBridge::new();
        bridge
            .set_outcome(BridgeOutcome::Degraded { status: Some(403) })
            .await;

        let budget = FlowBudget::new(Duration::from_secs(5));
        let mut ctx = FlowContext::new();
        let outcome = bridge
            .establish(&fixtures::credential("G1_S1"), &budget, &mut ctx)
            .await
            .unwrap();

        assert_eq!(outcome, BridgeOutcome::Degraded { status: Some(403) });
        assert!(ctx.is_degraded());
    }
}
