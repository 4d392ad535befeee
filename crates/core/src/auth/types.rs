//! Types for the member-proof provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signed member proof required to request a waiting-room entry descriptor.
///
/// Produced by the external member-profile endpoint; the fields are opaque
/// to this crate and forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProof {
    /// Signature over the secure blob.
    pub signature: String,
    /// Opaque secure data blob accompanying the signature.
    pub secure_blob: String,
    /// Encoded member identifier, also used when synthesizing a session id.
    pub encoded_member_id: String,
}

/// Errors from a member-proof provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication rejected: {0}")]
    Rejected(String),
}

/// Provider of signed member proofs.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Produce a member proof valid for the given goods code.
    async fn member_proof(&self, goods_code: &str) -> Result<MemberProof, AuthError>;
}
