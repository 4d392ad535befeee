//! Provider returning a fixed, pre-fetched member proof.

use async_trait::async_trait;

use super::{AuthError, AuthProvider, MemberProof};

/// Hands out the same proof for every request.
///
/// Used when the embedding application performs the login exchange itself
/// and passes the resulting proof in, and as the test implementation.
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    proof: MemberProof,
}

impl StaticAuthProvider {
    pub fn new(proof: MemberProof) -> Self {
        Self { proof }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn member_proof(&self, _goods_code: &str) -> Result<MemberProof, AuthError> {
        Ok(self.proof.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_configured_proof() {
        let proof = MemberProof {
            signature: "sig".to_string(),
            secure_blob: "blob".to_string(),
            encoded_member_id: "M0000000751".to_string(),
        };
        let provider = StaticAuthProvider::new(proof.clone());
        let got = provider.member_proof("25018223").await.unwrap();
        assert_eq!(got, proof);
    }
}
