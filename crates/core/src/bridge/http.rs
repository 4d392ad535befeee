//! Bridge HTTP implementation.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, EndpointConfig};
use crate::flow::{FlowBudget, FlowContext};
use crate::handshake::HandshakeCodec;
use crate::metrics;
use crate::session::{self, SessionCredential};
use crate::transport::{FlowTransport, SESSION_HEADER, TRACE_HEADER};

use super::{BridgeError, BridgeOutcome, SessionBridge};

/// Session bridge talking to the real HTTP endpoint.
pub struct HttpSessionBridge {
    transport: FlowTransport,
    endpoints: EndpointConfig,
    config: BridgeConfig,
    codec: Arc<dyn HandshakeCodec>,
}

impl HttpSessionBridge {
    pub fn new(
        transport: FlowTransport,
        endpoints: EndpointConfig,
        config: BridgeConfig,
        codec: Arc<dyn HandshakeCodec>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            config,
            codec,
        }
    }

    fn client(&self) -> &Client {
        self.transport.client()
    }

    /// Visit the redirect hint so the server establishes its side of the
    /// session and sets cookies. Best effort.
    async fn visit_redirect_hint(&self, hint: &str) {
        match self.client().get(hint).send().await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "redirect hint visited");
            }
            Err(e) => {
                warn!(error = %e, "redirect hint visit failed, continuing");
            }
        }
    }

    /// Estimate `server_time - local_time` in milliseconds.
    ///
    /// Prefers the authoritative server-time endpoint; falls back to the
    /// timestamp embedded in the session id. Acceptance is decided by the
    /// server either way, so this never aborts the flow.
    async fn estimate_clock_offset(&self, cred: &SessionCredential) -> i64 {
        if let Some(url) = &self.endpoints.server_time_url {
            match self.fetch_server_time(url).await {
                Ok(server_ms) => {
                    let offset = server_ms - Utc::now().timestamp_millis();
                    debug!(offset_ms = offset, "clock offset from server time endpoint");
                    return offset;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "server time fetch failed, falling back to session timestamp"
                    );
                }
            }
        }

        match session_clock_offset(&cred.session_id, cred.obtained_at.timestamp_millis()) {
            Some(offset) => {
                debug!(offset_ms = offset, "clock offset from session id timestamp");
                offset
            }
            None => {
                debug!("no clock offset source available, assuming zero");
                0
            }
        }
    }

    async fn fetch_server_time(&self, url: &str) -> Result<i64, String> {
        let nc = Utc::now().timestamp_millis().to_string();
        let response = self
            .client()
            .get(url)
            .query(&[("type", "1"), ("nc", nc.as_str())])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let text = response.text().await.map_err(|e| e.to_string())?;
        text.trim()
            .parse::<i64>()
            .map_err(|e| format!("unparsable server time {:?}: {}", text.trim(), e))
    }
}

#[async_trait::async_trait]
impl SessionBridge for HttpSessionBridge {
    fn name(&self) -> &str {
        "http"
    }

    async fn establish(
        &self,
        cred: &SessionCredential,
        budget: &FlowBudget,
        ctx: &mut FlowContext,
    ) -> Result<BridgeOutcome, BridgeError> {
        if let Some(hint) = &cred.redirect_hint {
            budget.checkpoint()?;
            self.visit_redirect_hint(hint).await;
        }

        budget.checkpoint()?;
        let offset = self.estimate_clock_offset(cred).await;
        if offset.abs() > self.config.skew_warn_ms {
            warn!(
                offset_ms = offset,
                "clock offset estimate exceeds skew threshold"
            );
        }
        ctx.clock_offset_ms = offset;

        budget.checkpoint()?;
        let server_now_ms = Utc::now().timestamp_millis() + offset;
        let payload = self.codec.encode(cred, server_now_ms)?;

        let url = format!(
            "{}/middleware/set-cookie",
            self.endpoints.bridge_url.trim_end_matches('/')
        );
        let referer = cred
            .redirect_hint
            .clone()
            .unwrap_or_else(|| format!("{}/", self.endpoints.origin));

        let result = self
            .client()
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Origin", &self.endpoints.origin)
            .header("Referer", referer)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(SESSION_HEADER, &cred.session_id)
            .header(TRACE_HEADER, &ctx.trace_id)
            .body(payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(codec = self.codec.name(), "bridge handshake established");
                metrics::HANDSHAKES.with_label_values(&["established"]).inc();
                Ok(BridgeOutcome::Established)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(
                    status,
                    codec = self.codec.name(),
                    "bridge handshake rejected"
                );
                ctx.mark_degraded(format!("handshake rejected (HTTP {})", status));
                metrics::HANDSHAKES.with_label_values(&["degraded"]).inc();
                Ok(BridgeOutcome::Degraded {
                    status: Some(status),
                })
            }
            Err(e) => {
                warn!(error = %e, "bridge endpoint unreachable");
                ctx.mark_degraded(format!("handshake unreachable: {}", e));
                metrics::HANDSHAKES.with_label_values(&["degraded"]).inc();
                Ok(BridgeOutcome::Degraded { status: None })
            }
        }
    }
}

/// Offset implied by the session id's embedded issue timestamp, relative to
/// when the credential was obtained locally.
fn session_clock_offset(session_id: &str, obtained_at_ms: i64) -> Option<i64> {
    session::embedded_timestamp_ms(session_id).map(|issued_ms| issued_ms - obtained_at_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_clock_offset_from_embedded_timestamp() {
        // Issued at 1768530066s; obtained locally two seconds later.
        let offset = session_clock_offset(
            "25018223_M0000000751971768530066",
            1_768_530_068_000,
        );
        assert_eq!(offset, Some(-2000));
    }

    #[test]
    fn test_session_clock_offset_without_timestamp() {
        assert_eq!(session_clock_offset("G1_S1", 1_768_530_068_000), None);
    }
}
