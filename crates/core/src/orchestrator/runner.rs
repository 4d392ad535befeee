//! Acquisition orchestrator implementation.
//!
//! Drives one flow through the state machine:
//! admission -> bridge handshake -> (zone scan -> lock attempt) loop.
//! Each phase depends on the previous phase's output, so the flow is
//! strictly sequential; independent flows run as independent orchestrators.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionError, AdmissionGate, HttpAdmissionGate};
use crate::auth::{AuthProvider, MemberProof};
use crate::bridge::{BridgeError, BridgeOutcome, HttpSessionBridge, SessionBridge};
use crate::challenge::{ChallengeSolver, DisabledSolver};
use crate::config::{Config, FlowConfig};
use crate::flow::{FlowBudget, FlowContext, Interrupted};
use crate::handshake::make_codec;
use crate::inventory::{
    HttpInventoryScanner, HttpUnitLocker, InventoryError, InventoryScanner, InventoryUnit,
    InventoryZone, LockOutcome, UnitLocker,
};
use crate::metrics;
use crate::session::SessionCredential;
use crate::transport::FlowTransport;

use super::types::{FlowError, FlowOutcome, FlowPhase, LockedUnit};

/// The acquisition orchestrator - sequences one flow end to end.
pub struct AcquisitionOrchestrator {
    config: FlowConfig,
    bridge_required: bool,
    auth: Arc<dyn AuthProvider>,
    gate: Arc<dyn AdmissionGate>,
    bridge: Arc<dyn SessionBridge>,
    scanner: Arc<dyn InventoryScanner>,
    locker: Arc<dyn UnitLocker>,
}

impl AcquisitionOrchestrator {
    /// Create a new orchestrator over the given phase implementations.
    pub fn new(
        config: FlowConfig,
        auth: Arc<dyn AuthProvider>,
        gate: Arc<dyn AdmissionGate>,
        bridge: Arc<dyn SessionBridge>,
        scanner: Arc<dyn InventoryScanner>,
        locker: Arc<dyn UnitLocker>,
    ) -> Self {
        Self {
            config,
            bridge_required: false,
            auth,
            gate,
            bridge,
            scanner,
            locker,
        }
    }

    /// Treat a rejected bridge handshake as fatal instead of degraded.
    pub fn with_bridge_required(mut self, required: bool) -> Self {
        self.bridge_required = required;
        self
    }

    /// Wire an orchestrator over the real HTTP implementations, with
    /// challenge solving disabled.
    ///
    /// The phases share one flow-scoped transport (cookie jar included), so
    /// an orchestrator built this way runs one flow at a time; build one
    /// orchestrator per concurrent flow.
    pub fn from_config(config: &Config, auth: Arc<dyn AuthProvider>) -> Self {
        Self::from_config_with_solver(config, auth, Arc::new(DisabledSolver))
    }

    /// Like [`from_config`](Self::from_config), with a challenge solver.
    pub fn from_config_with_solver(
        config: &Config,
        auth: Arc<dyn AuthProvider>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Self {
        let transport =
            FlowTransport::new(Duration::from_secs(config.endpoints.timeout_secs as u64));
        let codec = make_codec(&config.handshake);

        let gate = HttpAdmissionGate::new(
            transport.clone(),
            config.endpoints.clone(),
            config.flow.clone(),
        )
        .with_challenge(config.challenge.clone(), solver);
        let bridge = HttpSessionBridge::new(
            transport.clone(),
            config.endpoints.clone(),
            config.bridge.clone(),
            codec,
        );
        let scanner = HttpInventoryScanner::new(
            transport.clone(),
            config.endpoints.clone(),
            config.flow.clone(),
        );
        let locker = HttpUnitLocker::new(transport, config.endpoints.clone(), config.flow.clone());

        Self::new(
            config.flow.clone(),
            auth,
            Arc::new(gate),
            Arc::new(bridge),
            Arc::new(scanner),
            Arc::new(locker),
        )
        .with_bridge_required(config.bridge.required)
    }

    /// Run one flow with the configured deadline and a fresh cancel token.
    pub async fn run(&self, goods_code: &str) -> Result<FlowOutcome, FlowError> {
        let budget = FlowBudget::new(Duration::from_secs(self.config.flow_deadline_secs));
        self.run_with_budget(goods_code, budget).await
    }

    /// Run one flow, fetching the member proof from the auth provider.
    pub async fn run_with_budget(
        &self,
        goods_code: &str,
        budget: FlowBudget,
    ) -> Result<FlowOutcome, FlowError> {
        let proof = self
            .auth
            .member_proof(goods_code)
            .await
            .map_err(|e| FlowError::Fatal {
                phase: FlowPhase::Admission,
                last_status: None,
                message: e.to_string(),
            })?;
        self.run_with_proof(goods_code, &proof, budget).await
    }

    /// Run one flow with a pre-fetched member proof.
    pub async fn run_with_proof(
        &self,
        goods_code: &str,
        proof: &MemberProof,
        budget: FlowBudget,
    ) -> Result<FlowOutcome, FlowError> {
        let started = Instant::now();
        let result = self.execute(goods_code, proof, &budget).await;

        let label = match &result {
            Ok(_) => "locked",
            Err(e) => e.metric_label(),
        };
        metrics::FLOWS.with_label_values(&[label]).inc();
        metrics::FLOW_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn execute(
        &self,
        goods_code: &str,
        proof: &MemberProof,
        budget: &FlowBudget,
    ) -> Result<FlowOutcome, FlowError> {
        let mut ctx = FlowContext::new();
        info!(goods_code, trace_id = %ctx.trace_id, "starting acquisition flow");

        // Phase 1: admission.
        let admission_started = Instant::now();
        budget
            .checkpoint()
            .map_err(|i| interrupt_error(i, FlowPhase::Admission, None))?;

        let mut ticket = self
            .gate
            .enter(goods_code, proof, &mut ctx)
            .await
            .map_err(admission_error)?;

        let poll_budget = budget.scoped(Duration::from_secs(self.config.poll_timeout_secs));
        let credential = match self
            .gate
            .poll_until_admitted(&mut ticket, &poll_budget, &mut ctx)
            .await
        {
            Ok(credential) => {
                metrics::ADMISSIONS.with_label_values(&["admitted"]).inc();
                metrics::ADMISSION_WAIT
                    .with_label_values(&[])
                    .observe(admission_started.elapsed().as_secs_f64());
                credential
            }
            Err(e) => {
                let flow_err = admission_error(e);
                let label = match &flow_err {
                    FlowError::Timeout { .. } => "timeout",
                    _ => "failed",
                };
                metrics::ADMISSIONS.with_label_values(&[label]).inc();
                return Err(flow_err);
            }
        };

        ctx.ticket = Some(ticket);
        ctx.credential = Some(credential.clone());

        // Phase 2: bridge handshake.
        match self.bridge.establish(&credential, budget, &mut ctx).await {
            Ok(BridgeOutcome::Established) => {}
            Ok(BridgeOutcome::Degraded { status }) => {
                if self.bridge_required {
                    return Err(FlowError::Fatal {
                        phase: FlowPhase::Bridge,
                        last_status: status,
                        message: "bridge handshake rejected and bridge is required".to_string(),
                    });
                }
                warn!(status = ?status, "continuing with degraded bridge handshake");
            }
            Err(BridgeError::Interrupted(i)) => {
                return Err(interrupt_error(i, FlowPhase::Bridge, None));
            }
            Err(e) => {
                return Err(FlowError::Fatal {
                    phase: FlowPhase::Bridge,
                    last_status: None,
                    message: e.to_string(),
                });
            }
        }

        // Phases 3/4: zone scan and lock attempts.
        let scan_budget = budget.scoped(Duration::from_secs(self.config.zone_scan_timeout_secs));
        let (unit, zone) = self.scan_and_lock(&credential, &scan_budget).await?;

        info!(
            unit = %unit.unit_id,
            zone = %zone.zone_key,
            "unit locked, handing off to purchase pipeline"
        );

        Ok(FlowOutcome {
            unit: LockedUnit {
                unit,
                zone,
                locked_at: Utc::now(),
            },
            context: ctx,
        })
    }

    /// Fetch the zone list, retrying transient failures within the budget.
    async fn list_zones_with_retry(
        &self,
        cred: &SessionCredential,
        budget: &FlowBudget,
    ) -> Result<Vec<InventoryZone>, FlowError> {
        let interval = Duration::from_millis(self.config.scan_interval_ms);
        let mut last_status: Option<u16> = None;

        loop {
            budget
                .checkpoint()
                .map_err(|i| interrupt_error(i, FlowPhase::Scan, last_status))?;

            match self.scanner.list_zones(cred).await {
                Ok(zones) if zones.is_empty() => {
                    return Err(FlowError::Fatal {
                        phase: FlowPhase::Scan,
                        last_status: None,
                        message: "inventory returned no zones".to_string(),
                    });
                }
                Ok(zones) => return Ok(zones),
                Err(e) if e.is_transient() => {
                    last_status = e.status().or(last_status);
                    warn!(error = %e, "zone list fetch failed, retrying");
                }
                Err(e) => return Err(scan_fatal(e)),
            }

            tokio::time::sleep(budget.clamp(interval)).await;
        }
    }

    /// Scan zones in rounds, attempting a lock on each fresh candidate,
    /// until a lock succeeds or the budget runs out.
    ///
    /// A unit that produced a `Conflict` is never retried: attempted ids are
    /// excluded for the remainder of the flow, and the next attempt always
    /// targets a different unit.
    async fn scan_and_lock(
        &self,
        cred: &SessionCredential,
        budget: &FlowBudget,
    ) -> Result<(InventoryUnit, InventoryZone), FlowError> {
        let zones = self.list_zones_with_retry(cred, budget).await?;
        info!(zones = zones.len(), "scanning inventory zones");

        let interval = Duration::from_millis(self.config.scan_interval_ms);
        let mut attempted: HashSet<String> = HashSet::new();
        let mut last_status: Option<u16> = None;
        let mut round: u32 = 0;

        loop {
            round += 1;
            budget
                .checkpoint()
                .map_err(|i| interrupt_error(i, FlowPhase::Scan, last_status))?;
            debug!(round, attempted = attempted.len(), "zone scan round");

            for zone in &zones {
                budget
                    .checkpoint()
                    .map_err(|i| interrupt_error(i, FlowPhase::Scan, last_status))?;

                let unit = match self
                    .scanner
                    .scan_zone(zone, cred, self.config.price_ceiling)
                    .await
                {
                    Ok(Some(unit)) => {
                        metrics::ZONE_SCANS.with_label_values(&["hit"]).inc();
                        unit
                    }
                    Ok(None) => {
                        metrics::ZONE_SCANS.with_label_values(&["empty"]).inc();
                        continue;
                    }
                    Err(e) if e.is_transient() => {
                        // One bad zone never halts the scan.
                        last_status = e.status().or(last_status);
                        metrics::ZONE_SCANS.with_label_values(&["error"]).inc();
                        debug!(zone = %zone.zone_key, error = %e, "skipping zone after transient error");
                        continue;
                    }
                    Err(e) => return Err(scan_fatal(e)),
                };

                if attempted.contains(&unit.unit_id) {
                    debug!(unit = %unit.unit_id, "candidate already attempted, skipping");
                    continue;
                }
                attempted.insert(unit.unit_id.clone());

                budget
                    .checkpoint()
                    .map_err(|i| interrupt_error(i, FlowPhase::Lock, last_status))?;

                let attempt = self.locker.try_lock(&unit, cred).await.map_err(|e| {
                    metrics::LOCK_ATTEMPTS.with_label_values(&["error"]).inc();
                    FlowError::Fatal {
                        phase: FlowPhase::Lock,
                        last_status: e.status(),
                        message: e.to_string(),
                    }
                })?;

                match attempt.outcome {
                    LockOutcome::Locked => {
                        metrics::LOCK_ATTEMPTS.with_label_values(&["locked"]).inc();
                        return Ok((unit, zone.clone()));
                    }
                    LockOutcome::Conflict => {
                        metrics::LOCK_ATTEMPTS.with_label_values(&["conflict"]).inc();
                        debug!(unit = %unit.unit_id, "unit contended, advancing to next candidate");
                    }
                    LockOutcome::Rejected => {
                        metrics::LOCK_ATTEMPTS.with_label_values(&["rejected"]).inc();
                        return Err(FlowError::Fatal {
                            phase: FlowPhase::Lock,
                            last_status: None,
                            message: format!(
                                "lock rejected ({})",
                                attempt.error_code.unwrap_or_default()
                            ),
                        });
                    }
                }
            }

            tokio::time::sleep(budget.clamp(interval)).await;
        }
    }
}

fn admission_error(e: AdmissionError) -> FlowError {
    match e {
        AdmissionError::Interrupted(Interrupted::Cancelled) => FlowError::Cancelled {
            phase: FlowPhase::Admission,
        },
        AdmissionError::Interrupted(Interrupted::DeadlineExceeded) => FlowError::Timeout {
            phase: FlowPhase::Admission,
            last_status: None,
        },
        AdmissionError::Timeout { last_status } => FlowError::Timeout {
            phase: FlowPhase::Admission,
            last_status,
        },
        other => FlowError::Fatal {
            phase: FlowPhase::Admission,
            last_status: other.last_status(),
            message: other.to_string(),
        },
    }
}

fn interrupt_error(i: Interrupted, phase: FlowPhase, last_status: Option<u16>) -> FlowError {
    match i {
        Interrupted::Cancelled => FlowError::Cancelled { phase },
        Interrupted::DeadlineExceeded => FlowError::Timeout { phase, last_status },
    }
}

fn scan_fatal(e: InventoryError) -> FlowError {
    FlowError::Fatal {
        phase: FlowPhase::Scan,
        last_status: e.status(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_error_mapping() {
        let err = admission_error(AdmissionError::Timeout {
            last_status: Some(200),
        });
        assert!(matches!(
            err,
            FlowError::Timeout {
                phase: FlowPhase::Admission,
                last_status: Some(200),
            }
        ));

        let err = admission_error(Interrupted::Cancelled.into());
        assert!(matches!(
            err,
            FlowError::Cancelled {
                phase: FlowPhase::Admission
            }
        ));

        let err = admission_error(AdmissionError::Api {
            status: 403,
            message: "denied".to_string(),
        });
        assert!(matches!(
            err,
            FlowError::Fatal {
                phase: FlowPhase::Admission,
                last_status: Some(403),
                ..
            }
        ));
    }

    #[test]
    fn test_scan_fatal_keeps_status() {
        let err = scan_fatal(InventoryError::SessionRejected { status: 401 });
        assert_eq!(err.phase(), FlowPhase::Scan);
        assert_eq!(err.last_status(), Some(401));
    }

    #[tokio::test]
    async fn test_from_config_wires_http_stack() {
        use crate::auth::StaticAuthProvider;
        use crate::testing::fixtures;

        let config = crate::config::load_config_from_str(
            r#"
[endpoints]
waiting_url = "https://waiting.example.com/api"
bridge_url = "https://shop.example.com"
inventory_url = "https://shop.example.com/api"
origin = "https://shop.example.com"

[bridge]
required = true
"#,
        )
        .unwrap();

        let auth = Arc::new(StaticAuthProvider::new(fixtures::member_proof()));
        let orchestrator = AcquisitionOrchestrator::from_config(&config, auth);
        assert!(orchestrator.bridge_required);
        assert_eq!(orchestrator.config.poll_interval_ms, 3000);
    }
}
