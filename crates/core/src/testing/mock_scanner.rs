//! Mock inventory scanner for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::inventory::{InventoryError, InventoryScanner, InventoryUnit, InventoryZone};
use crate::session::SessionCredential;

/// One scripted scan result for a zone.
#[derive(Debug, Clone)]
pub enum MockScan {
    /// The zone offers this unit.
    Unit(InventoryUnit),
    /// The zone has no eligible units.
    Empty,
    /// The zone returns a transient server error.
    Transient(u16),
    /// The session is rejected (terminal).
    SessionRejected(u16),
}

impl MockScan {
    fn into_result(self) -> Result<Option<InventoryUnit>, InventoryError> {
        match self {
            MockScan::Unit(unit) => Ok(Some(unit)),
            MockScan::Empty => Ok(None),
            MockScan::Transient(status) => Err(InventoryError::Transient { status }),
            MockScan::SessionRejected(status) => Err(InventoryError::SessionRejected { status }),
        }
    }
}

/// Mock implementation of the `InventoryScanner` trait.
///
/// Each zone carries a scripted queue of scan results consumed in order;
/// an exhausted queue scans as empty. Zone keys and session ids are
/// recorded for assertions.
pub struct MockInventoryScanner {
    zones: Arc<RwLock<Vec<InventoryZone>>>,
    scripts: Arc<RwLock<HashMap<String, VecDeque<MockScan>>>>,
    scans: Arc<RwLock<Vec<String>>>,
    sessions: Arc<RwLock<Vec<String>>>,
}

impl Default for MockInventoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInventoryScanner {
    pub fn new() -> Self {
        Self {
            zones: Arc::new(RwLock::new(Vec::new())),
            scripts: Arc::new(RwLock::new(HashMap::new())),
            scans: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the zone list returned by `list_zones`.
    pub async fn set_zones(&self, zones: Vec<InventoryZone>) {
        *self.zones.write().await = zones;
    }

    /// Script the scan results for one zone, consumed in order.
    pub async fn script_zone(&self, zone_key: &str, results: Vec<MockScan>) {
        self.scripts
            .write()
            .await
            .insert(zone_key.to_string(), results.into());
    }

    /// Zone keys scanned, in call order.
    pub async fn recorded_scans(&self) -> Vec<String> {
        self.scans.read().await.clone()
    }

    /// Session ids observed across list/scan calls, in call order.
    pub async fn recorded_session_ids(&self) -> Vec<String> {
        self.sessions.read().await.clone()
    }
}

#[async_trait]
impl InventoryScanner for MockInventoryScanner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_zones(
        &self,
        cred: &SessionCredential,
    ) -> Result<Vec<InventoryZone>, InventoryError> {
        self.sessions.write().await.push(cred.session_id.clone());
        Ok(self.zones.read().await.clone())
    }

    async fn scan_zone(
        &self,
        zone: &InventoryZone,
        cred: &SessionCredential,
        _price_ceiling: Option<u64>,
    ) -> Result<Option<InventoryUnit>, InventoryError> {
        self.scans.write().await.push(zone.zone_key.clone());
        self.sessions.write().await.push(cred.session_id.clone());

        let step = self
            .scripts
            .write()
            .await
            .get_mut(&zone.zone_key)
            .and_then(|queue| queue.pop_front());

        match step {
            Some(step) => step.into_result(),
            None => Ok(None),
        }
    }
}
