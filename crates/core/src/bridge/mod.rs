//! Session bridge: exchanges admission proof for inventory-domain
//! authorization (cookie-equivalent state).
//!
//! The handshake has been observed to be optional under some server
//! configurations, so rejection is a *value* (`BridgeOutcome::Degraded`)
//! rather than an error; the orchestrator decides whether a degraded
//! bridge aborts the flow.

mod http;

pub use http::HttpSessionBridge;

use async_trait::async_trait;
use thiserror::Error;

use crate::flow::{FlowBudget, FlowContext, Interrupted};
use crate::handshake::HandshakeError;
use crate::session::SessionCredential;

/// Result of a bridge handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Handshake accepted by the bridge endpoint.
    Established,
    /// Handshake rejected or unreachable; the flow may still proceed.
    Degraded { status: Option<u16> },
}

/// Errors that can occur while establishing a session.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("handshake encoding failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Establishes inventory-domain authorization from an admission credential.
#[async_trait]
pub trait SessionBridge: Send + Sync {
    /// Bridge name for logging.
    fn name(&self) -> &str;

    /// Perform the handshake. Updates the context's clock offset estimate
    /// and degraded markers as a side effect.
    async fn establish(
        &self,
        cred: &SessionCredential,
        budget: &FlowBudget,
        ctx: &mut FlowContext,
    ) -> Result<BridgeOutcome, BridgeError>;
}
