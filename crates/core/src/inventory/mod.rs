//! Inventory scanning and optimistic locking.
//!
//! This module provides an `InventoryScanner` trait for enumerating zones
//! and finding offerable units, and a `UnitLocker` trait for tentative
//! reservations under contention.

mod http;
mod locker;
mod types;

pub use http::HttpInventoryScanner;
pub use locker::HttpUnitLocker;
pub use types::*;
