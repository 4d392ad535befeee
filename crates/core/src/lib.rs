//! Client-side implementation of a three-phase admission/acquisition
//! protocol for high-demand inventory systems: enter a virtual waiting room
//! and obtain an admission rank, exchange the admission result for a session
//! credential via a bridge handshake, then scan partitioned inventory under
//! contention and acquire one unit with an optimistic lock.
//!
//! The [`orchestrator::AcquisitionOrchestrator`] sequences the phases; each
//! phase sits behind a trait ([`admission::AdmissionGate`],
//! [`bridge::SessionBridge`], [`inventory::InventoryScanner`],
//! [`inventory::UnitLocker`]) with an HTTP implementation and a mock in
//! [`testing`]. All state for one flow lives in [`flow::FlowContext`] and
//! the flow-scoped [`transport::FlowTransport`]; nothing is shared between
//! concurrent flows.

pub mod admission;
pub mod auth;
pub mod bridge;
pub mod challenge;
pub mod config;
pub mod flow;
pub mod handshake;
pub mod inventory;
pub mod metrics;
pub mod orchestrator;
pub mod session;
pub mod testing;
pub mod transport;

pub use admission::{AdmissionGate, AdmissionStatus, AdmissionTicket, HttpAdmissionGate};
pub use auth::{AuthProvider, MemberProof, StaticAuthProvider};
pub use bridge::{BridgeOutcome, HttpSessionBridge, SessionBridge};
pub use challenge::{ChallengeSolver, DisabledSolver};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, HandshakeStrategy,
};
pub use flow::{CancelToken, FlowBudget, FlowContext};
pub use handshake::{make_codec, HandshakeCodec};
pub use inventory::{
    HttpInventoryScanner, HttpUnitLocker, InventoryScanner, InventoryUnit, InventoryZone,
    LockAttempt, LockOutcome, UnitLocker,
};
pub use orchestrator::{AcquisitionOrchestrator, FlowError, FlowOutcome, FlowPhase, LockedUnit};
pub use session::SessionCredential;
pub use transport::FlowTransport;
