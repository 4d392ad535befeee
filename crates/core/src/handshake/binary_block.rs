//! Fixed-size binary handshake encoding.
//!
//! Layout matches the captured 64-byte payload: an 8-byte big-endian server
//! timestamp (millis), the 32-byte SHA-256 digest of the session id, and a
//! 24-byte HMAC-SHA256 signature over `session_id || timestamp` keyed with
//! the bridge key (zero-filled when no key was issued). The block is
//! base64-encoded and wrapped in quotes, since the endpoint reads the body
//! as a JSON string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::session::SessionCredential;

use super::{HandshakeCodec, HandshakeError};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 24;

/// 64-byte binary handshake payload strategy.
#[derive(Debug, Clone, Default)]
pub struct BinaryBlockCodec;

impl BinaryBlockCodec {
    pub fn new() -> Self {
        Self
    }
}

impl HandshakeCodec for BinaryBlockCodec {
    fn name(&self) -> &str {
        "binary-block"
    }

    fn encode(
        &self,
        cred: &SessionCredential,
        server_time_ms: i64,
    ) -> Result<Vec<u8>, HandshakeError> {
        let mut block = Vec::with_capacity(64);
        block.extend_from_slice(&(server_time_ms as u64).to_be_bytes());
        block.extend_from_slice(&Sha256::digest(cred.session_id.as_bytes()));

        if cred.bridge_key.is_empty() {
            block.extend_from_slice(&[0u8; SIGNATURE_LEN]);
        } else {
            let mut mac = HmacSha256::new_from_slice(cred.bridge_key.as_bytes())
                .map_err(|_| HandshakeError::InvalidKey)?;
            mac.update(cred.session_id.as_bytes());
            mac.update(server_time_ms.to_string().as_bytes());
            let signature = mac.finalize().into_bytes();
            block.extend_from_slice(&signature[..SIGNATURE_LEN]);
        }

        Ok(format!("\"{}\"", BASE64.encode(&block)).into_bytes())
    }
}
