//! Waiting-room admission.
//!
//! This module provides an `AdmissionGate` trait for entering the virtual
//! waiting room and polling queue rank until a session credential is issued.

mod http;
mod types;

pub use http::HttpAdmissionGate;
pub use types::*;
