//! Tentative reservation (optimistic lock) HTTP implementation.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{EndpointConfig, FlowConfig};
use crate::session::SessionCredential;
use crate::transport::{FlowTransport, CHANNEL_HEADER, SESSION_HEADER, TRACE_HEADER};

use super::{InventoryUnit, LockAttempt, LockError, LockOutcome, UnitLocker};

/// Unit locker talking to the real HTTP API.
pub struct HttpUnitLocker {
    transport: FlowTransport,
    endpoints: EndpointConfig,
    flow: FlowConfig,
}

impl HttpUnitLocker {
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
}

#[async_trait::async_trait]
impl UnitLocker for HttpUnitLocker {
    fn name(&self) -> &str {
        "http"
    }

    async fn try_lock(
        &self,
        unit: &InventoryUnit,
        cred: &SessionCredential,
    ) -> Result<LockAttempt, LockError> {
        let url = format!(
            "{}/lock",
            self.endpoints.inventory_url.trim_end_matches('/')
        );
        let trace_id = Uuid::new_v4().simple().to_string()[..16].to_string();

        let response = self
            .client()
            .post(&url)
            .header("Origin", &self.endpoints.origin)
            .header("Referer", format!("{}/", self.endpoints.origin))
            .header("X-Requested-With", "XMLHttpRequest")
            .header(SESSION_HEADER, &cred.session_id)
            .header(CHANNEL_HEADER, &self.flow.channel)
            .header(TRACE_HEADER, trace_id)
            .json(&LockRequest {
                biz_code: &self.flow.biz_code,
                unit_id: &unit.unit_id,
                grade_code: &unit.grade_code,
            })
            .send()
            .await
            .map_err(|e| LockError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        let body: LockResponse = if status.as_u16() == 204 {
            LockResponse::default()
        } else {
            response.json().await.unwrap_or_default()
        };

        let attempt = interpret_lock_response(status.as_u16(), body.code, &unit.unit_id);
        match attempt.outcome {
            LockOutcome::Locked => debug!(unit = %unit.unit_id, "unit locked"),
            // Contention is the common case; never logged above debug.
            LockOutcome::Conflict => debug!(unit = %unit.unit_id, "unit already taken"),
            LockOutcome::Rejected => warn!(
                unit = %unit.unit_id,
                status = status.as_u16(),
                code = attempt.error_code.as_deref().unwrap_or(""),
                "lock request rejected"
            ),
        }

        Ok(attempt)
    }
}

/// Map the lock endpoint's HTTP status and application code to an outcome.
///
/// HTTP 409 or an already-taken application code mean contention; every
/// other rejection is terminal. The live system's exact code set is
/// unverified, so the conflict check is deliberately narrow.
fn interpret_lock_response(status: u16, code: Option<String>, unit_id: &str) -> LockAttempt {
    let conflict_by_code = code.as_deref().map(is_conflict_code).unwrap_or(false);

    let outcome = if status == 409 || conflict_by_code {
        LockOutcome::Conflict
    } else if (200..300).contains(&status) {
        LockOutcome::Locked
    } else {
        LockOutcome::Rejected
    };

    let error_code = match outcome {
        LockOutcome::Locked => None,
        _ => code.or_else(|| Some(format!("HTTP_{}", status))),
    };

    LockAttempt {
        unit_id: unit_id.to_string(),
        outcome,
        error_code,
    }
}

fn is_conflict_code(code: &str) -> bool {
    let upper = code.to_ascii_uppercase();
    upper.starts_with("SEAT_TAKEN") || upper.starts_with("ALREADY") || upper.contains("SOLD_OUT")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockRequest<'a> {
    biz_code: &'a str,
    unit_id: &'a str,
    grade_code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct LockResponse {
    #[serde(default, alias = "resultCode")]
    code: Option<String>,
}
