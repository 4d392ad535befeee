//! Flow-scoped state threaded through the acquisition phases.
//!
//! One flow = one sequential pass through admission, bridge handshake and
//! inventory scan/lock. Everything here is owned by a single
//! `AcquisitionOrchestrator` run and discarded when the flow ends; nothing
//! is shared between concurrent flows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use crate::admission::AdmissionTicket;
use crate::session::SessionCredential;

/// Cooperative cancellation flag shared between a flow and its owner.
///
/// Checked at the head of every blocking loop; cancelling does not abort an
/// in-flight request, it prevents the next one from being issued.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A flow was interrupted before completing its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("flow cancelled")]
    Cancelled,

    #[error("flow deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline plus cancellation token for one flow (or one phase of it).
#[derive(Debug, Clone)]
pub struct FlowBudget {
    deadline: Instant,
    cancel: CancelToken,
}

impl FlowBudget {
    /// Budget expiring `timeout` from now with a fresh cancel token.
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancel(timeout, CancelToken::new())
    }

    /// Budget expiring `timeout` from now, cancellable through `cancel`.
    pub fn with_cancel(timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    /// A sub-budget for one phase: expires after `timeout` or at the parent
    /// deadline, whichever comes first. Shares the parent's cancel token.
    pub fn scoped(&self, timeout: Duration) -> Self {
        Self {
            deadline: self.deadline.min(Instant::now() + timeout),
            cancel: self.cancel.clone(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the deadline, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Clamp a sleep interval so it never overshoots the deadline.
    pub fn clamp(&self, interval: Duration) -> Duration {
        interval.min(self.remaining())
    }

    /// Check cancellation first, then the deadline. Called before every
    /// blocking network call.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.expired() {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Mutable aggregate owned by the orchestrator for the duration of one flow.
///
/// HTTP cookie state lives in the flow-scoped `reqwest` client, not here.
#[derive(Debug, Clone)]
pub struct FlowContext {
    /// Trace id sent with bridge/inventory calls for operator diagnosis.
    pub trace_id: String,
    /// Queue position record, present once admission has been entered.
    pub ticket: Option<AdmissionTicket>,
    /// Session credential, present once admission has been granted.
    pub credential: Option<SessionCredential>,
    /// Estimated server-minus-local clock offset in milliseconds.
    pub clock_offset_ms: i64,
    /// Best-effort steps that failed but did not abort the flow.
    degraded: Vec<String>,
}

impl FlowContext {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string()[..16].to_string(),
            ticket: None,
            credential: None,
            clock_offset_ms: 0,
            degraded: Vec::new(),
        }
    }

    /// Record a degraded (failed but non-fatal) step.
    pub fn mark_degraded(&mut self, reason: impl Into<String>) {
        self.degraded.push(reason.into());
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn degraded_reasons(&self) -> &[String] {
        &self.degraded
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_checkpoint_prefers_cancellation() {
        let budget = FlowBudget::new(Duration::ZERO);
        budget.cancel_token().cancel();
        assert_eq!(budget.checkpoint(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn test_checkpoint_deadline() {
        let budget = FlowBudget::new(Duration::ZERO);
        assert_eq!(budget.checkpoint(), Err(Interrupted::DeadlineExceeded));

        let budget = FlowBudget::new(Duration::from_secs(60));
        assert!(budget.checkpoint().is_ok());
    }

    #[test]
    fn test_clamp_never_exceeds_remaining() {
        let budget = FlowBudget::new(Duration::from_millis(50));
        let clamped = budget.clamp(Duration::from_secs(10));
        assert!(clamped <= Duration::from_millis(50));
    }

    #[test]
    fn test_scoped_budget_respects_parent_deadline() {
        let parent = FlowBudget::new(Duration::from_millis(20));
        let child = parent.scoped(Duration::from_secs(60));
        assert!(child.remaining() <= Duration::from_millis(20));
    }

    #[test]
    fn test_scoped_budget_shares_cancel_token() {
        let parent = FlowBudget::new(Duration::from_secs(60));
        let child = parent.scoped(Duration::from_secs(1));
        parent.cancel_token().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_context_trace_id_is_short_hex() {
        let ctx = FlowContext::new();
        assert_eq!(ctx.trace_id.len(), 16);
        assert!(ctx.trace_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_context_degraded_markers() {
        let mut ctx = FlowContext::new();
        assert!(!ctx.is_degraded());
        ctx.mark_degraded("handshake rejected (HTTP 403)");
        assert!(ctx.is_degraded());
        assert_eq!(ctx.degraded_reasons().len(), 1);
    }
}
