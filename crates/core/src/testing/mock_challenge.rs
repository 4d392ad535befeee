//! Mock challenge solver for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::challenge::{ChallengeError, ChallengeSolver};

/// Mock implementation of the `ChallengeSolver` trait.
pub struct MockChallengeSolver {
    token: Option<String>,
    calls: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockChallengeSolver {
    /// Solver that always yields `token`.
    pub fn solving(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Solver that always fails.
    pub fn failing() -> Self {
        Self {
            token: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// (page_url, site_key) pairs observed, in call order.
    pub async fn recorded_calls(&self) -> Vec<(String, String)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ChallengeSolver for MockChallengeSolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn solve(&self, page_url: &str, site_key: &str) -> Result<String, ChallengeError> {
        self.calls
            .write()
            .await
            .push((page_url.to_string(), site_key.to_string()));

        match &self.token {
            Some(token) => Ok(token.clone()),
            None => Err(ChallengeError::Unsolved("scripted failure".to_string())),
        }
    }
}
