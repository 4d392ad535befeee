//! Flow lifecycle integration tests.
//!
//! These tests drive the orchestrator through the full state machine over
//! mock phase implementations:
//! admission -> bridge handshake -> zone scan -> lock -> handoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use frontrow_core::config::FlowConfig;
use frontrow_core::testing::{
    fixtures, MockAdmissionGate, MockInventoryScanner, MockPollStep, MockScan, MockSessionBridge,
    MockUnitLocker,
};
use frontrow_core::{
    AcquisitionOrchestrator, AdmissionGate, AdmissionStatus, BridgeOutcome, CancelToken,
    FlowBudget, FlowError, FlowPhase, InventoryScanner, LockOutcome, SessionBridge,
    StaticAuthProvider, UnitLocker,
};

/// Test helper bundling mock implementations of every phase.
struct TestHarness {
    gate: Arc<MockAdmissionGate>,
    bridge: Arc<MockSessionBridge>,
    scanner: Arc<MockInventoryScanner>,
    locker: Arc<MockUnitLocker>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            gate: Arc::new(MockAdmissionGate::new()),
            bridge: Arc::new(MockSessionBridge::new()),
            scanner: Arc::new(MockInventoryScanner::new()),
            locker: Arc::new(MockUnitLocker::new()),
        }
    }

    /// Pacing tuned for tests: millisecond intervals, second-scale budgets.
    fn fast_config() -> FlowConfig {
        FlowConfig {
            poll_interval_ms: 5,
            poll_timeout_secs: 5,
            scan_interval_ms: 5,
            zone_scan_timeout_secs: 5,
            flow_deadline_secs: 10,
            ..Default::default()
        }
    }

    fn create_orchestrator(&self) -> AcquisitionOrchestrator {
        self.create_orchestrator_with(Self::fast_config())
    }

    fn create_orchestrator_with(&self, config: FlowConfig) -> AcquisitionOrchestrator {
        AcquisitionOrchestrator::new(
            config,
            Arc::new(StaticAuthProvider::new(fixtures::member_proof())),
            Arc::clone(&self.gate) as Arc<dyn AdmissionGate>,
            Arc::clone(&self.bridge) as Arc<dyn SessionBridge>,
            Arc::clone(&self.scanner) as Arc<dyn InventoryScanner>,
            Arc::clone(&self.locker) as Arc<dyn UnitLocker>,
        )
    }

    /// Script the straightforward happy path: rank polls then admission,
    /// one zone with one unit, lock succeeds.
    async fn script_happy_path(&self, session_id: &str) {
        self.gate
            .set_poll_sequence(vec![
                MockPollStep::waiting(5, 100),
                MockPollStep::admitted(fixtures::credential(session_id)),
            ])
            .await;
        self.scanner
            .set_zones(vec![fixtures::zone("Z1", "Floor 1")])
            .await;
        self.scanner
            .script_zone("Z1", vec![MockScan::Unit(fixtures::unit("Z1-0001", 90_000))])
            .await;
    }
}

#[tokio::test]
async fn test_flow_locks_unit_after_rank_polls() {
    let harness = TestHarness::new();
    harness.script_happy_path("G1_S1").await;

    let outcome = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .expect("flow should lock a unit");

    assert_eq!(outcome.unit.unit.unit_id, "Z1-0001");
    assert_eq!(outcome.unit.zone.zone_key, "Z1");
    assert_eq!(harness.gate.recorded_enters().await, vec!["25018223"]);
    assert_eq!(
        outcome.context.ticket.as_ref().map(|t| t.status),
        Some(AdmissionStatus::Admitted)
    );
}

#[tokio::test]
async fn test_admission_transitions_to_bridge_exactly_once() {
    let harness = TestHarness::new();
    // First poll carries rank metadata only, second admits. The bridge
    // must be called exactly once, with the credential's session id.
    harness.script_happy_path("G1_S1").await;

    let outcome = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap();

    assert_eq!(harness.bridge.call_count().await, 1);
    assert_eq!(harness.bridge.recorded_session_ids().await, vec!["G1_S1"]);
    assert_eq!(
        outcome.context.credential.as_ref().map(|c| c.session_id.as_str()),
        Some("G1_S1")
    );
}

#[tokio::test]
async fn test_session_id_stable_across_every_phase_call() {
    let harness = TestHarness::new();
    harness
        .gate
        .admit_immediately(fixtures::credential("25018223_M0000000751971768530066"))
        .await;
    harness
        .scanner
        .set_zones(vec![
            fixtures::zone("Z1", "Floor 1"),
            fixtures::zone("Z2", "Floor 2"),
        ])
        .await;
    // Z1's unit is contended; Z2's unit locks on the second round.
    harness
        .scanner
        .script_zone("Z1", vec![MockScan::Unit(fixtures::unit("Z1-0001", 1000))])
        .await;
    harness
        .scanner
        .script_zone(
            "Z2",
            vec![
                MockScan::Empty,
                MockScan::Unit(fixtures::unit("Z2-0001", 1000)),
            ],
        )
        .await;
    harness
        .locker
        .script_unit("Z1-0001", vec![LockOutcome::Conflict])
        .await;

    harness.create_orchestrator().run("25018223").await.unwrap();

    let expected = "25018223_M0000000751971768530066";
    for observed in harness
        .bridge
        .recorded_session_ids()
        .await
        .into_iter()
        .chain(harness.scanner.recorded_session_ids().await)
        .chain(harness.locker.recorded_session_ids().await)
    {
        assert_eq!(observed, expected, "session id must stay byte-identical");
    }
}

#[tokio::test]
async fn test_poll_deadline_yields_timeout_in_admission_phase() {
    let harness = TestHarness::new();
    // No poll script: the gate waits forever, the budget has to cut it off.
    let config = FlowConfig {
        poll_timeout_secs: 1,
        ..TestHarness::fast_config()
    };

    let started = Instant::now();
    let err = harness
        .create_orchestrator_with(config)
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Timeout {
            phase: FlowPhase::Admission,
            ..
        }
    ));
    // Bounded overshoot: never blocks much past the poll deadline.
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(harness.bridge.call_count().await, 0);
}

#[tokio::test]
async fn test_cancellation_mid_poll_returns_cancelled() {
    let harness = TestHarness::new();
    // No poll script: the flow sits in the rank-poll loop until cancelled.

    let cancel = CancelToken::new();
    let budget = FlowBudget::with_cancel(Duration::from_secs(30), cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = harness
        .create_orchestrator()
        .run_with_proof("25018223", &fixtures::member_proof(), budget)
        .await
        .unwrap_err();

    canceller.await.unwrap();
    assert!(matches!(
        err,
        FlowError::Cancelled {
            phase: FlowPhase::Admission
        }
    ));
    assert_eq!(harness.bridge.call_count().await, 0);
}

#[tokio::test]
async fn test_admission_rejection_is_fatal() {
    let harness = TestHarness::new();
    harness
        .gate
        .set_next_enter_error(frontrow_core::admission::AdmissionError::Api {
            status: 403,
            message: "member proof rejected".to_string(),
        })
        .await;

    let err = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Admission,
            last_status: Some(403),
            ..
        }
    ));
    assert_eq!(harness.bridge.call_count().await, 0);
}

#[tokio::test]
async fn test_degraded_bridge_continues_by_default() {
    let harness = TestHarness::new();
    harness.script_happy_path("G1_S1").await;
    harness
        .bridge
        .set_outcome(BridgeOutcome::Degraded { status: Some(403) })
        .await;

    let outcome = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .expect("degraded bridge must not abort the flow by default");

    assert!(outcome.context.is_degraded());
    assert_eq!(outcome.unit.unit.unit_id, "Z1-0001");
}

#[tokio::test]
async fn test_degraded_bridge_aborts_when_required() {
    let harness = TestHarness::new();
    harness.script_happy_path("G1_S1").await;
    harness
        .bridge
        .set_outcome(BridgeOutcome::Degraded { status: Some(403) })
        .await;

    let err = harness
        .create_orchestrator()
        .with_bridge_required(true)
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Bridge,
            last_status: Some(403),
            ..
        }
    ));
    // The inventory phase must never have started.
    assert!(harness.scanner.recorded_scans().await.is_empty());
}

#[tokio::test]
async fn test_rejected_lock_aborts_flow() {
    let harness = TestHarness::new();
    harness.script_happy_path("G1_S1").await;
    harness
        .locker
        .script_unit("Z1-0001", vec![LockOutcome::Rejected])
        .await;

    let err = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Lock,
            ..
        }
    ));
    assert_eq!(harness.locker.recorded_attempts().await, vec!["Z1-0001"]);
}

#[tokio::test]
async fn test_lock_transport_error_aborts_flow() {
    let harness = TestHarness::new();
    harness.script_happy_path("G1_S1").await;
    harness
        .locker
        .set_next_error(frontrow_core::inventory::LockError::ConnectionFailed(
            "connection reset".to_string(),
        ))
        .await;

    let err = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Lock,
            ..
        }
    ));
}

#[tokio::test]
async fn test_session_rejection_during_scan_aborts_flow() {
    let harness = TestHarness::new();
    harness
        .gate
        .admit_immediately(fixtures::credential("G1_S1"))
        .await;
    harness
        .scanner
        .set_zones(vec![fixtures::zone("Z1", "Floor 1")])
        .await;
    harness
        .scanner
        .script_zone("Z1", vec![MockScan::SessionRejected(401)])
        .await;

    let err = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Scan,
            last_status: Some(401),
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_zone_list_is_fatal() {
    let harness = TestHarness::new();
    harness
        .gate
        .admit_immediately(fixtures::credential("G1_S1"))
        .await;
    // No zones configured.

    let err = harness
        .create_orchestrator()
        .run("25018223")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Fatal {
            phase: FlowPhase::Scan,
            ..
        }
    ));
}

#[tokio::test]
async fn test_independent_flows_run_concurrently() {
    let harness_a = TestHarness::new();
    let harness_b = TestHarness::new();
    harness_a.script_happy_path("G1_S1").await;
    harness_b.script_happy_path("G2_S2").await;

    let orchestrator_a = harness_a.create_orchestrator();
    let orchestrator_b = harness_b.create_orchestrator();

    let (a, b) = tokio::join!(orchestrator_a.run("10001"), orchestrator_b.run("10002"));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Each flow kept its own credential; no state bled across.
    assert_eq!(
        a.context.credential.as_ref().map(|c| c.session_id.as_str()),
        Some("G1_S1")
    );
    assert_eq!(
        b.context.credential.as_ref().map(|c| c.session_id.as_str()),
        Some("G2_S2")
    );
    assert_eq!(harness_a.bridge.recorded_session_ids().await, vec!["G1_S1"]);
    assert_eq!(harness_b.bridge.recorded_session_ids().await, vec!["G2_S2"]);
}
