//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission (rank polls, outcomes, wait time)
//! - Bridge handshake outcomes
//! - Inventory scanning and lock attempts
//! - Whole-flow outcomes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

/// Rank polls issued against the waiting room.
pub static RANK_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("frontrow_rank_polls_total", "Total rank polls issued").unwrap()
});

/// Admission phase outcomes.
pub static ADMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontrow_admissions_total", "Admission phase outcomes"),
        &["result"], // "admitted", "timeout", "failed"
    )
    .unwrap()
});

/// Time spent waiting for admission, in seconds.
pub static ADMISSION_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "frontrow_admission_wait_seconds",
            "Time from queue entry to admission",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &[],
    )
    .unwrap()
});

/// Bridge handshake outcomes.
pub static HANDSHAKES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontrow_handshakes_total", "Bridge handshake outcomes"),
        &["result"], // "established", "degraded"
    )
    .unwrap()
});

/// Zone scans by result.
pub static ZONE_SCANS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontrow_zone_scans_total", "Zone scans by result"),
        &["result"], // "hit", "empty", "error"
    )
    .unwrap()
});

/// Lock attempts by outcome.
pub static LOCK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontrow_lock_attempts_total", "Lock attempts by outcome"),
        &["outcome"], // "locked", "conflict", "rejected", "error"
    )
    .unwrap()
});

/// Completed flows by result.
pub static FLOWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontrow_flows_total", "Completed flows by result"),
        &["result"], // "locked", "timeout", "cancelled", "fatal"
    )
    .unwrap()
});

/// Whole-flow duration in seconds.
pub static FLOW_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("frontrow_flow_duration_seconds", "Duration of flows").buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0,
        ]),
        &["result"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RANK_POLLS.clone()),
        Box::new(ADMISSIONS.clone()),
        Box::new(ADMISSION_WAIT.clone()),
        Box::new(HANDSHAKES.clone()),
        Box::new(ZONE_SCANS.clone()),
        Box::new(LOCK_ATTEMPTS.clone()),
        Box::new(FLOWS.clone()),
        Box::new(FLOW_DURATION.clone()),
    ]
}
