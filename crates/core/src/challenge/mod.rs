//! Bot-mitigation challenge solving, modeled as an opaque capability.
//!
//! Solving is best-effort throughout the flow: a failed or disabled solver
//! degrades the flow (logged, recorded in the context) but never aborts it.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a challenge solver.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge solving is disabled")]
    Disabled,

    #[error("challenge solver connection failed: {0}")]
    ConnectionFailed(String),

    #[error("challenge could not be solved: {0}")]
    Unsolved(String),
}

/// Solves a bot-mitigation challenge for a page, yielding a clearance token.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Solver name for logging.
    fn name(&self) -> &str;

    /// Solve the challenge presented at `page_url`. `site_key` is the
    /// page-embedded key when one is known, empty otherwise.
    async fn solve(&self, page_url: &str, site_key: &str) -> Result<String, ChallengeError>;
}

/// Solver used when bot-mitigation is not configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledSolver;

#[async_trait]
impl ChallengeSolver for DisabledSolver {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn solve(&self, _page_url: &str, _site_key: &str) -> Result<String, ChallengeError> {
        Err(ChallengeError::Disabled)
    }
}
