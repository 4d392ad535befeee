//! Types for the acquisition orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::flow::FlowContext;
use crate::inventory::{InventoryUnit, InventoryZone};

/// The phase a flow error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Admission,
    Bridge,
    Scan,
    Lock,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowPhase::Admission => "admission",
            FlowPhase::Bridge => "bridge",
            FlowPhase::Scan => "inventory scan",
            FlowPhase::Lock => "lock",
        };
        f.write_str(name)
    }
}

/// Terminal flow failures. Transient, conflict and degraded conditions are
/// absorbed inside the phases; only these propagate to the caller.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{phase} phase deadline exceeded")]
    Timeout {
        phase: FlowPhase,
        last_status: Option<u16>,
    },

    #[error("flow cancelled during {phase} phase")]
    Cancelled { phase: FlowPhase },

    #[error("fatal error in {phase} phase: {message}")]
    Fatal {
        phase: FlowPhase,
        last_status: Option<u16>,
        message: String,
    },
}

impl FlowError {
    /// Phase the error originated in.
    pub fn phase(&self) -> FlowPhase {
        match self {
            FlowError::Timeout { phase, .. }
            | FlowError::Cancelled { phase }
            | FlowError::Fatal { phase, .. } => *phase,
        }
    }

    /// Last HTTP status observed before the failure, when one was seen.
    pub fn last_status(&self) -> Option<u16> {
        match self {
            FlowError::Timeout { last_status, .. } | FlowError::Fatal { last_status, .. } => {
                *last_status
            }
            FlowError::Cancelled { .. } => None,
        }
    }

    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            FlowError::Timeout { .. } => "timeout",
            FlowError::Cancelled { .. } => "cancelled",
            FlowError::Fatal { .. } => "fatal",
        }
    }
}

/// A unit held by this session, ready for the purchase pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedUnit {
    pub unit: InventoryUnit,
    pub zone: InventoryZone,
    pub locked_at: DateTime<Utc>,
}

/// Result of a successful flow: the locked unit plus the flow context the
/// purchase pipeline needs (session credential, clock offset, trace id).
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub unit: LockedUnit,
    pub context: FlowContext,
}
