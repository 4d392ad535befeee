//! Mock admission gate for testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::admission::{
    AdmissionError, AdmissionGate, AdmissionStatus, AdmissionTicket,
};
use crate::auth::MemberProof;
use crate::flow::{FlowBudget, FlowContext, Interrupted};
use crate::session::SessionCredential;

/// One scripted rank-poll response.
#[derive(Debug, Clone)]
pub struct MockPollStep {
    pub rank: u32,
    pub total_rank: u32,
    /// When set, this step admits the flow with the given credential.
    pub credential: Option<SessionCredential>,
}

impl MockPollStep {
    /// A rank-only response that keeps the flow waiting.
    pub fn waiting(rank: u32, total_rank: u32) -> Self {
        Self {
            rank,
            total_rank,
            credential: None,
        }
    }

    /// A response carrying the session credential.
    pub fn admitted(credential: SessionCredential) -> Self {
        Self {
            rank: 0,
            total_rank: 0,
            credential: Some(credential),
        }
    }
}

/// Mock implementation of the `AdmissionGate` trait.
///
/// Provides controllable behavior for testing:
/// - Scripted rank-poll sequences
/// - One-shot enter failures
/// - Recorded enter calls for assertions
///
/// With an exhausted (or empty) poll script the gate keeps "waiting"
/// forever, respecting the budget exactly like the real gate. That is how
/// timeout and cancellation paths are exercised.
pub struct MockAdmissionGate {
    poll_steps: Arc<RwLock<VecDeque<MockPollStep>>>,
    next_enter_error: Arc<RwLock<Option<AdmissionError>>>,
    enters: Arc<RwLock<Vec<String>>>,
    poll_delay: Arc<RwLock<Duration>>,
}

impl Default for MockAdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdmissionGate {
    pub fn new() -> Self {
        Self {
            poll_steps: Arc::new(RwLock::new(VecDeque::new())),
            next_enter_error: Arc::new(RwLock::new(None)),
            enters: Arc::new(RwLock::new(Vec::new())),
            poll_delay: Arc::new(RwLock::new(Duration::from_millis(5))),
        }
    }

    /// Set the scripted poll responses, replacing any existing script.
    pub async fn set_poll_sequence(&self, steps: Vec<MockPollStep>) {
        *self.poll_steps.write().await = steps.into();
    }

    /// Script an immediate admission with the given credential.
    pub async fn admit_immediately(&self, credential: SessionCredential) {
        self.set_poll_sequence(vec![MockPollStep::admitted(credential)])
            .await;
    }

    /// Configure the next enter call to fail with the given error.
    pub async fn set_next_enter_error(&self, error: AdmissionError) {
        *self.next_enter_error.write().await = Some(error);
    }

    /// Delay between simulated polls (default 5ms).
    pub async fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.write().await = delay;
    }

    /// Goods codes passed to enter, in call order.
    pub async fn recorded_enters(&self) -> Vec<String> {
        self.enters.read().await.clone()
    }
}

#[async_trait]
impl AdmissionGate for MockAdmissionGate {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enter(
        &self,
        goods_code: &str,
        proof: &MemberProof,
        _ctx: &mut FlowContext,
    ) -> Result<AdmissionTicket, AdmissionError> {
        if let Some(error) = self.next_enter_error.write().await.take() {
            return Err(error);
        }

        self.enters.write().await.push(goods_code.to_string());

        Ok(AdmissionTicket {
            waiting_id: format!("mock-wait-{}", goods_code),
            member_key: proof.encoded_member_id.clone(),
            goods_code: goods_code.to_string(),
            rank: 0,
            total_rank: 0,
            status: AdmissionStatus::Waiting,
        })
    }

    async fn poll_until_admitted(
        &self,
        ticket: &mut AdmissionTicket,
        budget: &FlowBudget,
        _ctx: &mut FlowContext,
    ) -> Result<SessionCredential, AdmissionError> {
        loop {
            if budget.is_cancelled() {
                return Err(Interrupted::Cancelled.into());
            }
            if budget.expired() {
                ticket.status = AdmissionStatus::TimedOut;
                return Err(AdmissionError::Timeout { last_status: None });
            }

            let step = self.poll_steps.write().await.pop_front();
            if let Some(step) = step {
                ticket.rank = step.rank;
                ticket.total_rank = step.total_rank;
                if let Some(credential) = step.credential {
                    ticket.status = AdmissionStatus::Admitted;
                    return Ok(credential);
                }
            }

            let delay = *self.poll_delay.read().await;
            tokio::time::sleep(budget.clamp(delay)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_scripted_admission() {
        let gate = MockAdmissionGate::new();
        gate.set_poll_sequence(vec![
            MockPollStep::waiting(5, 100),
            MockPollStep::admitted(fixtures::credential("G1_S1")),
        ])
        .await;

        let mut ctx = FlowContext::new();
        let mut ticket = gate
            .enter("25018223", &fixtures::member_proof(), &mut ctx)
            .await
            .unwrap();

        let budget = FlowBudget::new(Duration::from_secs(5));
        let cred = gate
            .poll_until_admitted(&mut ticket, &budget, &mut ctx)
            .await
            .unwrap();

        assert_eq!(cred.session_id, "G1_S1");
        assert_eq!(ticket.status, AdmissionStatus::Admitted);
        assert_eq!(gate.recorded_enters().await, vec!["25018223"]);
    }

    #[tokio::test]
    async fn test_empty_script_times_out() {
        let gate = MockAdmissionGate::new();
        let mut ctx = FlowContext::new();
        let mut ticket = gate
            .enter("25018223", &fixtures::member_proof(), &mut ctx)
            .await
            .unwrap();

        let budget = FlowBudget::new(Duration::from_millis(50));
        let result = gate
            .poll_until_admitted(&mut ticket, &budget, &mut ctx)
            .await;

        assert!(matches!(result, Err(AdmissionError::Timeout { .. })));
        assert_eq!(ticket.status, AdmissionStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_enter_error_is_one_shot() {
        let gate = MockAdmissionGate::new();
        gate.set_next_enter_error(AdmissionError::Api {
            status: 403,
            message: "denied".to_string(),
        })
        .await;

        let mut ctx = FlowContext::new();
        let result = gate
            .enter("25018223", &fixtures::member_proof(), &mut ctx)
            .await;
        assert!(result.is_err());

        let result = gate
            .enter("25018223", &fixtures::member_proof(), &mut ctx)
            .await;
        assert!(result.is_ok());
    }
}
