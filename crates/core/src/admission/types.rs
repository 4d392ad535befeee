//! Types for the waiting-room admission phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::MemberProof;
use crate::flow::{FlowBudget, FlowContext, Interrupted};
use crate::session::SessionCredential;

/// Lifecycle of an admission ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    /// In the queue, rank updates expected.
    Waiting,
    /// Credential issued, ticket is spent.
    Admitted,
    /// Poll budget ran out before a credential was issued.
    TimedOut,
    /// Terminal failure reported by the waiting room.
    Failed,
}

/// Queue position record issued by the waiting room.
///
/// Mutated only by rank-poll responses and discarded once the status is
/// terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionTicket {
    /// Queue ticket id returned by line-up.
    pub waiting_id: String,
    /// Encoded member id, kept for credential synthesis.
    pub member_key: String,
    pub goods_code: String,
    /// Current position in the queue (0 = front).
    pub rank: u32,
    /// Queue length at the last poll.
    pub total_rank: u32,
    pub status: AdmissionStatus,
}

/// Errors that can occur during the admission phase.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("waiting room connection failed: {0}")]
    ConnectionFailed(String),

    #[error("waiting room API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("entry descriptor missing {0}")]
    MissingField(&'static str),

    #[error("waiting room reported terminal status {status:?}")]
    Rejected { status: String },

    #[error("admission not granted before the poll deadline")]
    Timeout { last_status: Option<u16> },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl AdmissionError {
    /// Last HTTP status observed before this error, for flow diagnostics.
    pub fn last_status(&self) -> Option<u16> {
        match self {
            AdmissionError::Api { status, .. } => Some(*status),
            AdmissionError::Timeout { last_status } => *last_status,
            _ => None,
        }
    }
}

/// Drives the waiting-room protocol up to an issued session credential.
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Gate name for logging.
    fn name(&self) -> &str;

    /// Request an entry descriptor and join the queue.
    async fn enter(
        &self,
        goods_code: &str,
        proof: &MemberProof,
        ctx: &mut FlowContext,
    ) -> Result<AdmissionTicket, AdmissionError>;

    /// Poll queue rank until a credential is issued or the budget runs out.
    /// One blocking request at a time; never polls in parallel.
    async fn poll_until_admitted(
        &self,
        ticket: &mut AdmissionTicket,
        budget: &FlowBudget,
        ctx: &mut FlowContext,
    ) -> Result<SessionCredential, AdmissionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_serialization() {
        let ticket = AdmissionTicket {
            waiting_id: "w-123".to_string(),
            member_key: "M0000000751".to_string(),
            goods_code: "25018223".to_string(),
            rank: 5,
            total_rank: 100,
            status: AdmissionStatus::Waiting,
        };
        let json = serde_json::to_string(&ticket).unwrap();
        assert!(json.contains("\"waiting\""));
        let parsed: AdmissionTicket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rank, 5);
        assert_eq!(parsed.status, AdmissionStatus::Waiting);
    }

    #[test]
    fn test_error_last_status() {
        let err = AdmissionError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.last_status(), Some(503));

        let err = AdmissionError::Timeout {
            last_status: Some(200),
        };
        assert_eq!(err.last_status(), Some(200));

        let err = AdmissionError::MissingField("key");
        assert_eq!(err.last_status(), None);

        let err = AdmissionError::Rejected {
            status: "CLOSED".to_string(),
        };
        assert_eq!(err.last_status(), None);
        assert_eq!(
            err.to_string(),
            "waiting room reported terminal status \"CLOSED\""
        );
    }

    #[test]
    fn test_interrupted_converts() {
        let err: AdmissionError = Interrupted::Cancelled.into();
        assert!(matches!(
            err,
            AdmissionError::Interrupted(Interrupted::Cancelled)
        ));
    }
}
