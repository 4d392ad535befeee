//! Length-budgeted JSON array handshake encoding.
//!
//! Builds several candidate JSON arrays from the credential and sends the
//! one whose serialized size lands closest to the configured budget (the
//! captured request had Content-Length 90). Ties go to the earlier, simpler
//! candidate.

use serde_json::{json, Value};

use crate::session::SessionCredential;

use super::{HandshakeCodec, HandshakeError};

/// JSON-array handshake payload strategy.
#[derive(Debug, Clone)]
pub struct CompactJsonCodec {
    length_budget: usize,
}

impl CompactJsonCodec {
    pub fn new(length_budget: usize) -> Self {
        Self { length_budget }
    }

    fn candidates(cred: &SessionCredential, server_time_ms: i64) -> Vec<Value> {
        let goods_code = cred.session_id.split('_').next().unwrap_or_default();
        vec![
            json!([cred.session_id]),
            json!([cred.bridge_key, cred.session_id]),
            json!([
                cred.session_id,
                cred.bridge_key,
                cred.bridge_signature,
                goods_code
            ]),
            json!([{
                "sessionId": cred.session_id,
                "key": cred.bridge_key,
                "signature": cred.bridge_signature,
                "timestamp": server_time_ms,
            }]),
        ]
    }
}

impl HandshakeCodec for CompactJsonCodec {
    fn name(&self) -> &str {
        "compact-json"
    }

    fn encode(
        &self,
        cred: &SessionCredential,
        server_time_ms: i64,
    ) -> Result<Vec<u8>, HandshakeError> {
        let mut best: Option<Vec<u8>> = None;
        let mut best_distance = usize::MAX;

        for candidate in Self::candidates(cred, server_time_ms) {
            let bytes = serde_json::to_vec(&candidate)
                .map_err(|e| HandshakeError::Serialize(e.to_string()))?;
            let distance = bytes.len().abs_diff(self.length_budget);
            if distance < best_distance {
                best_distance = distance;
                best = Some(bytes);
            }
        }

        // At least one candidate always exists.
        best.ok_or_else(|| HandshakeError::Serialize("no payload candidates".to_string()))
    }
}
