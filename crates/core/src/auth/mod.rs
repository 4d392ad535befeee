//! Member-proof abstraction.
//!
//! The identity/login exchange that yields a bearer credential lives outside
//! this crate; the flow only needs the signed member proof the waiting room
//! expects. `AuthProvider` models that collaborator, `StaticAuthProvider`
//! wires a pre-fetched proof.

mod static_proof;
mod types;

pub use static_proof::StaticAuthProvider;
pub use types::*;
