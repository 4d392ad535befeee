//! Bridge handshake payload encoding.
//!
//! The bridge endpoint expects an opaque payload derived from the session
//! credential, but its exact wire format is an unverified external contract:
//! two incompatible encodings have been observed, so both ship behind the
//! `HandshakeCodec` trait and the active one is selected by configuration.
//!
//! Encoding must be deterministic: the same credential at the same estimated
//! server time yields the same bytes, which makes handshake retries safe.

mod binary_block;
mod compact_json;

pub use binary_block::BinaryBlockCodec;
pub use compact_json::CompactJsonCodec;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{HandshakeConfig, HandshakeStrategy};
use crate::session::SessionCredential;

/// Errors that can occur while encoding a handshake payload.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to serialize handshake payload: {0}")]
    Serialize(String),

    #[error("invalid handshake key material")]
    InvalidKey,
}

/// Produces the opaque payload POSTed to the bridge endpoint.
pub trait HandshakeCodec: Send + Sync {
    /// Strategy name for logging.
    fn name(&self) -> &str;

    /// Encode the credential at the given estimated server time (epoch
    /// millis). Must be deterministic for fixed inputs.
    fn encode(
        &self,
        cred: &SessionCredential,
        server_time_ms: i64,
    ) -> Result<Vec<u8>, HandshakeError>;
}

/// Build the codec selected by configuration.
pub fn make_codec(config: &HandshakeConfig) -> Arc<dyn HandshakeCodec> {
    match config.strategy {
        HandshakeStrategy::CompactJson => Arc::new(CompactJsonCodec::new(config.length_budget)),
        HandshakeStrategy::BinaryBlock => Arc::new(BinaryBlockCodec::new()),
    }
}
