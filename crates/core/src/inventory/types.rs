//! Types for the inventory scan/lock phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionCredential;

/// A scan partition of the inventory space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryZone {
    /// Opaque partition key used in zone-detail queries.
    pub zone_key: String,
    /// Human-readable zone name.
    pub display_name: String,
}

/// One inventory unit within a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub unit_id: String,
    pub grade_code: String,
    pub grade_name: String,
    /// Sales price in minor currency units.
    pub price: u64,
    /// Whether the unit is currently offerable at all; `false` means not
    /// sellable regardless of lock state.
    pub exposable: bool,
    /// Physical location hint (floor/row/number), for operator display.
    pub position_hint: Option<String>,
}

/// Outcome of one tentative reservation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOutcome {
    /// The unit is held for this session.
    Locked,
    /// Another session holds the unit. The expected common case under
    /// contention; advance to the next candidate.
    Conflict,
    /// The endpoint rejected the request for a non-contention reason
    /// (malformed request, expired session). Terminal for the flow.
    Rejected,
}

/// Record of a single lock attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAttempt {
    pub unit_id: String,
    pub outcome: LockOutcome,
    /// Application error code accompanying a non-locked outcome.
    pub error_code: Option<String>,
}

/// Errors that can occur while scanning inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory connection failed: {0}")]
    ConnectionFailed(String),

    /// Transient server error on one zone; skip it and keep scanning.
    #[error("transient inventory error (HTTP {status})")]
    Transient { status: u16 },

    /// Session no longer accepted by the inventory domain. Terminal.
    #[error("inventory session rejected (HTTP {status})")]
    SessionRejected { status: u16 },

    #[error("inventory API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse inventory response: {0}")]
    Parse(String),
}

impl InventoryError {
    /// Whether a zone hitting this error should be skipped rather than
    /// aborting the scan.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InventoryError::Transient { .. }
                | InventoryError::ConnectionFailed(_)
                | InventoryError::Parse(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            InventoryError::Transient { status }
            | InventoryError::SessionRejected { status }
            | InventoryError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the lock endpoint's transport. All terminal; contention is
/// reported through `LockOutcome`, not here.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock endpoint connection failed: {0}")]
    ConnectionFailed(String),

    #[error("lock endpoint error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

impl LockError {
    pub fn status(&self) -> Option<u16> {
        match self {
            LockError::Api { status, .. } => Some(*status),
            LockError::ConnectionFailed(_) => None,
        }
    }
}

/// Enumerates zones and finds offerable units.
///
/// Scanning is per-zone and sequential: the backing API is unreliable under
/// batched multi-zone queries.
#[async_trait]
pub trait InventoryScanner: Send + Sync {
    /// Scanner name for logging.
    fn name(&self) -> &str;

    /// List all scan partitions.
    async fn list_zones(
        &self,
        cred: &SessionCredential,
    ) -> Result<Vec<InventoryZone>, InventoryError>;

    /// First exposable, price-eligible unit in the zone, if any.
    async fn scan_zone(
        &self,
        zone: &InventoryZone,
        cred: &SessionCredential,
        price_ceiling: Option<u64>,
    ) -> Result<Option<InventoryUnit>, InventoryError>;
}

/// Attempts a tentative reservation on one unit.
#[async_trait]
pub trait UnitLocker: Send + Sync {
    /// Locker name for logging.
    fn name(&self) -> &str;

    /// Try to lock the unit. `Conflict` is an expected outcome, not an
    /// error; callers advance to a different unit instead of retrying.
    async fn try_lock(
        &self,
        unit: &InventoryUnit,
        cred: &SessionCredential,
    ) -> Result<LockAttempt, LockError>;
}
