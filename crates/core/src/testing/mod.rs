//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all phase traits, allowing
//! full flow testing without a live waiting room or inventory service.
//!
//! # Example
//!
//! ```rust,ignore
//! use frontrow_core::testing::{fixtures, MockAdmissionGate, MockUnitLocker};
//!
//! let gate = MockAdmissionGate::new();
//! gate.set_poll_sequence(vec![
//!     MockPollStep::waiting(5, 100),
//!     MockPollStep::admitted(fixtures::credential("G1_S1")),
//! ]).await;
//!
//! // Wire into an AcquisitionOrchestrator...
//! ```

mod mock_admission;
mod mock_bridge;
mod mock_challenge;
mod mock_locker;
mod mock_scanner;

pub use mock_admission::{MockAdmissionGate, MockPollStep};
pub use mock_bridge::MockSessionBridge;
pub use mock_challenge::MockChallengeSolver;
pub use mock_locker::MockUnitLocker;
pub use mock_scanner::{MockInventoryScanner, MockScan};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::auth::MemberProof;
    use crate::inventory::{InventoryUnit, InventoryZone};
    use crate::session::SessionCredential;

    /// Create a test session credential with reasonable defaults.
    pub fn credential(session_id: &str) -> SessionCredential {
        SessionCredential {
            session_id: session_id.to_string(),
            bridge_key: "test-bridge-key".to_string(),
            bridge_signature: "test-signature".to_string(),
            redirect_hint: None,
            obtained_at: Utc::now(),
        }
    }

    /// Create a test member proof.
    pub fn member_proof() -> MemberProof {
        MemberProof {
            signature: "test-signature".to_string(),
            secure_blob: "test-secure-blob".to_string(),
            encoded_member_id: "M0000000751".to_string(),
        }
    }

    /// Create a test inventory zone.
    pub fn zone(key: &str, name: &str) -> InventoryZone {
        InventoryZone {
            zone_key: key.to_string(),
            display_name: name.to_string(),
        }
    }

    /// Create an exposable test unit.
    pub fn unit(id: &str, price: u64) -> InventoryUnit {
        InventoryUnit {
            unit_id: id.to_string(),
            grade_code: "R".to_string(),
            grade_name: "R Grade".to_string(),
            price,
            exposable: true,
            position_hint: Some(format!("1F-A-{}", id)),
        }
    }
}
