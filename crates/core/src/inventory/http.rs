//! Inventory scanner HTTP implementation.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{EndpointConfig, FlowConfig};
use crate::session::SessionCredential;
use crate::transport::{FlowTransport, CHANNEL_HEADER, SESSION_HEADER, TRACE_HEADER};

use super::{InventoryError, InventoryScanner, InventoryUnit, InventoryZone};

/// Inventory scanner talking to the real HTTP API.
///
/// Zone-detail queries go out one zone key per request: batched queries have
/// been observed to return server errors for some zones.
pub struct HttpInventoryScanner {
    transport: FlowTransport,
    endpoints: EndpointConfig,
    flow: FlowConfig,
}

impl HttpInventoryScanner {
    pub fn new(transport: FlowTransport, endpoints: EndpointConfig, flow: FlowConfig) -> Self {
        Self {
            transport,
            endpoints,
            flow,
        }
    }

    fn client(&self) -> &Client {
        self.transport.client()
    }

    fn base_url(&self) -> &str {
        self.endpoints.inventory_url.trim_end_matches('/')
    }

    fn request(&self, url: &str, cred: &SessionCredential) -> reqwest::RequestBuilder {
        let trace_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        self.client()
            .get(url)
            .header("Origin", &self.endpoints.origin)
            .header("Referer", format!("{}/", self.endpoints.origin))
            .header("X-Requested-With", "XMLHttpRequest")
            .header(SESSION_HEADER, &cred.session_id)
            .header(CHANNEL_HEADER, &self.flow.channel)
            .header(TRACE_HEADER, trace_id)
    }
}

#[async_trait::async_trait]
impl InventoryScanner for HttpInventoryScanner {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_zones(
        &self,
        cred: &SessionCredential,
    ) -> Result<Vec<InventoryZone>, InventoryError> {
        let url = format!("{}/zones", self.base_url());

        let response = self
            .request(&url, cred)
            .send()
            .await
            .map_err(|e| InventoryError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), "zone list"));
        }

        let zones: Vec<ZoneRecord> = response
            .json()
            .await
            .map_err(|e| InventoryError::Parse(e.to_string()))?;

        debug!(zones = zones.len(), "zone list fetched");

        Ok(zones
            .into_iter()
            .map(|z| InventoryZone {
                display_name: z.display_name.unwrap_or_else(|| z.zone_key.clone()),
                zone_key: z.zone_key,
            })
            .collect())
    }

    async fn scan_zone(
        &self,
        zone: &InventoryZone,
        cred: &SessionCredential,
        price_ceiling: Option<u64>,
    ) -> Result<Option<InventoryUnit>, InventoryError> {
        let url = format!("{}/zone-detail", self.base_url());

        let response = self
            .request(&url, cred)
            .query(&[("zoneKeys", zone.zone_key.as_str())])
            .send()
            .await
            .map_err(|e| InventoryError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err = classify_status(status.as_u16(), "zone detail");
            if err.is_transient() {
                debug!(zone = %zone.zone_key, status = status.as_u16(), "zone returned transient error");
            } else {
                warn!(zone = %zone.zone_key, status = status.as_u16(), "zone scan rejected");
            }
            return Err(err);
        }

        let blocks: Vec<ZoneDetail> = response
            .json()
            .await
            .map_err(|e| InventoryError::Parse(e.to_string()))?;

        let units: Vec<InventoryUnit> = blocks
            .into_iter()
            .flat_map(|b| b.units)
            .map(UnitRecord::into_unit)
            .collect();

        Ok(pick_eligible(units, price_ceiling))
    }
}

/// Map an HTTP error status to an inventory error.
///
/// 5xx responses are the transient per-zone failures the live system emits
/// under load; 401/403 mean the session is no longer accepted.
fn classify_status(status: u16, what: &str) -> InventoryError {
    match status {
        401 | 403 => InventoryError::SessionRejected { status },
        500..=599 => InventoryError::Transient { status },
        _ => InventoryError::Api {
            status,
            message: format!("{} request failed", what),
        },
    }
}

/// First exposable unit at or under the price ceiling.
///
/// Non-exposable units are filtered out before any price comparison.
fn pick_eligible(
    units: Vec<InventoryUnit>,
    price_ceiling: Option<u64>,
) -> Option<InventoryUnit> {
    units
        .into_iter()
        .filter(|u| u.exposable)
        .find(|u| price_ceiling.is_none_or(|ceiling| u.price <= ceiling))
}

// Inventory API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneRecord {
    zone_key: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneDetail {
    #[serde(default)]
    units: Vec<UnitRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitRecord {
    unit_id: String,
    #[serde(default)]
    grade_code: String,
    #[serde(default)]
    grade_name: String,
    #[serde(default)]
    sales_price: u64,
    #[serde(default)]
    is_exposable: bool,
    #[serde(default)]
    floor: Option<String>,
    #[serde(default)]
    row_no: Option<String>,
    #[serde(default)]
    unit_no: Option<String>,
}

impl UnitRecord {
    fn into_unit(self) -> InventoryUnit {
        let position_hint = match (&self.floor, &self.row_no, &self.unit_no) {
            (None, None, None) => None,
            (floor, row, no) => Some(format!(
                "{}-{}-{}",
                floor.as_deref().unwrap_or("?"),
                row.as_deref().unwrap_or("?"),
                no.as_deref().unwrap_or("?")
            )),
        };

        InventoryUnit {
            unit_id: self.unit_id,
            grade_code: self.grade_code,
            grade_name: self.grade_name,
            price: self.sales_price,
            exposable: self.is_exposable,
            position_hint,
        }
    }
}
