//! Waiting-room HTTP implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::MemberProof;
use crate::challenge::ChallengeSolver;
use crate::config::{ChallengeConfig, EndpointConfig, FlowConfig};
use crate::flow::{FlowBudget, FlowContext, Interrupted};
use crate::metrics;
use crate::session::{self, SessionCredential};
use crate::transport::FlowTransport;

use super::{AdmissionError, AdmissionGate, AdmissionStatus, AdmissionTicket};

/// Waiting-room gate talking to the real HTTP API.
pub struct HttpAdmissionGate {
    transport: FlowTransport,
    endpoints: EndpointConfig,
    flow: FlowConfig,
    challenge: ChallengeConfig,
    solver: Option<Arc<dyn ChallengeSolver>>,
}

impl HttpAdmissionGate {
    pub fn new(transport: FlowTransport, endpoints: EndpointConfig, flow: FlowConfig) -> Self {
        Self {
            transport,
            endpoints,
            flow,
            challenge: ChallengeConfig::default(),
            solver: None,
        }
    }

    /// Wire a challenge solver; only consulted when `config.enabled`.
    pub fn with_challenge(
        mut self,
        config: ChallengeConfig,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Self {
        self.challenge = config;
        self.solver = Some(solver);
        self
    }

    fn client(&self) -> &Client {
        self.transport.client()
    }

    fn base_url(&self) -> &str {
        self.endpoints.waiting_url.trim_end_matches('/')
    }

    /// Request the one-time entry descriptor from the waiting room.
    async fn request_entry_descriptor(
        &self,
        goods_code: &str,
        proof: &MemberProof,
    ) -> Result<SecureUrlResponse, AdmissionError> {
        let url = format!("{}/secure-url", self.base_url());
        let body = SecureUrlRequest {
            biz_code: &self.flow.biz_code,
            secure_data: &proof.secure_blob,
            signature: &proof.signature,
            goods_code,
            pre_sales: "N",
            lang: &self.flow.language,
            from: &self.flow.channel,
        };

        let response = self
            .client()
            .post(&url)
            .header("Origin", &self.endpoints.origin)
            .header("Referer", format!("{}/", self.endpoints.origin))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdmissionError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdmissionError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        response.json().await.map_err(|e| AdmissionError::Api {
            status: status.as_u16(),
            message: format!("failed to parse entry descriptor: {}", e),
        })
    }

    /// Solve the entry challenge, best effort. Failures degrade, never abort.
    async fn solve_entry_challenge(&self, page_url: &str, ctx: &mut FlowContext) {
        let Some(solver) = &self.solver else {
            debug!("challenge enabled but no solver wired, skipping");
            return;
        };

        match solver.solve(page_url, &self.challenge.site_key).await {
            Ok(token) => {
                self.transport
                    .set_cookie(&self.endpoints.origin, "challenge-token", &token);
                debug!(solver = solver.name(), "entry challenge solved");
            }
            Err(e) => {
                warn!(
                    solver = solver.name(),
                    error = %e,
                    "entry challenge not solved, continuing without it"
                );
                ctx.mark_degraded(format!("challenge solve failed: {}", e));
            }
        }
    }

    /// Submit the decoded entry key, obtaining a queue ticket id.
    async fn line_up(&self, key: &str) -> Result<String, AdmissionError> {
        let url = format!("{}/line-up", self.base_url());

        let response = self
            .client()
            .post(&url)
            .header("Origin", &self.endpoints.origin)
            .header("Referer", format!("{}/", self.endpoints.origin))
            .json(&LineUpRequest { key })
            .send()
            .await
            .map_err(|e| AdmissionError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdmissionError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let line_up: LineUpResponse = response.json().await.map_err(|e| AdmissionError::Api {
            status: status.as_u16(),
            message: format!("failed to parse line-up response: {}", e),
        })?;

        Ok(line_up.waiting_id)
    }
}

#[async_trait::async_trait]
impl AdmissionGate for HttpAdmissionGate {
    fn name(&self) -> &str {
        "http"
    }

    async fn enter(
        &self,
        goods_code: &str,
        proof: &MemberProof,
        ctx: &mut FlowContext,
    ) -> Result<AdmissionTicket, AdmissionError> {
        info!(goods_code, "entering waiting room");

        let descriptor = self.request_entry_descriptor(goods_code, proof).await?;
        let key = extract_entry_key(&descriptor)?;
        debug!(key_len = key.len(), "entry key extracted");

        if self.challenge.enabled {
            let page_url = descriptor.entry_url().unwrap_or(&self.endpoints.origin);
            self.solve_entry_challenge(page_url, ctx).await;
        }

        let waiting_id = self.line_up(&key).await?;
        info!(waiting_id = %waiting_id, "joined waiting queue");

        Ok(AdmissionTicket {
            waiting_id,
            member_key: proof.encoded_member_id.clone(),
            goods_code: goods_code.to_string(),
            rank: 0,
            total_rank: 0,
            status: AdmissionStatus::Waiting,
        })
    }

    async fn poll_until_admitted(
        &self,
        ticket: &mut AdmissionTicket,
        budget: &FlowBudget,
        ctx: &mut FlowContext,
    ) -> Result<SessionCredential, AdmissionError> {
        let url = format!("{}/rank", self.base_url());
        let interval = Duration::from_millis(self.flow.poll_interval_ms);
        let mut last_status: Option<u16> = None;
        let mut polls: u32 = 0;

        loop {
            if budget.is_cancelled() {
                return Err(Interrupted::Cancelled.into());
            }
            if budget.expired() {
                ticket.status = AdmissionStatus::TimedOut;
                warn!(waiting_id = %ticket.waiting_id, polls, "admission poll deadline reached");
                return Err(AdmissionError::Timeout { last_status });
            }

            polls += 1;
            metrics::RANK_POLLS.inc();

            let result = self
                .client()
                .get(&url)
                .query(&[
                    ("bizCode", self.flow.biz_code.as_str()),
                    ("waitingId", ticket.waiting_id.as_str()),
                ])
                .header("Origin", &self.endpoints.origin)
                .send()
                .await;

            match result {
                Err(e) => {
                    warn!(error = %e, "rank poll failed, retrying");
                }
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());

                    if status.is_success() {
                        match response.json::<RankResponse>().await {
                            Err(e) => warn!(error = %e, "rank response parse failed, retrying"),
                            Ok(rank) => {
                                if let Some(r) = rank.rank {
                                    ticket.rank = r;
                                }
                                if let Some(t) = rank.total_rank {
                                    ticket.total_rank = t;
                                }
                                debug!(
                                    rank = ticket.rank,
                                    total = ticket.total_rank,
                                    status = rank.status.as_deref().unwrap_or(""),
                                    "queue position"
                                );

                                match rank_verdict(&rank, ticket, ctx) {
                                    RankVerdict::Admitted(cred) => {
                                        ticket.status = AdmissionStatus::Admitted;
                                        info!(
                                            session_id = %cred.session_id,
                                            polls,
                                            "admission granted"
                                        );
                                        return Ok(cred);
                                    }
                                    RankVerdict::Terminal(reported) => {
                                        ticket.status = AdmissionStatus::Failed;
                                        warn!(
                                            status = %reported,
                                            "waiting room reported terminal status"
                                        );
                                        return Err(AdmissionError::Rejected { status: reported });
                                    }
                                    RankVerdict::KeepWaiting => {}
                                }
                            }
                        }
                    } else {
                        warn!(
                            status = status.as_u16(),
                            "rank poll returned error status, retrying"
                        );
                    }
                }
            }

            tokio::time::sleep(budget.clamp(interval)).await;
        }
    }
}

/// Extract the line-up entry key from an entry descriptor.
///
/// The key rides in the redirect URL percent-encoded; line-up expects the
/// decoded form (`/` and `+`, not `%2F`/`%2B`); submitting the raw value
/// fails admission silently. A bare top-level `key` field is already decoded
/// and used as-is.
fn extract_entry_key(response: &SecureUrlResponse) -> Result<String, AdmissionError> {
    if let Some(url) = response.entry_url() {
        if let Some(raw) = query_param(url, "key") {
            let decoded =
                urlencoding::decode(&raw).map_err(|_| AdmissionError::MissingField("key"))?;
            return Ok(decoded.into_owned());
        }
    }
    if let Some(key) = &response.key {
        return Ok(key.clone());
    }
    Err(AdmissionError::MissingField("key"))
}

/// First value of a query parameter, still percent-encoded.
fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.splitn(2, '?').nth(1)?;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(|v| v.to_string());
        }
    }
    None
}

fn is_admitted_status(status: &str) -> bool {
    matches!(status, "ENTER" | "READY" | "SUCCESS")
}

fn is_waiting_status(status: &str) -> bool {
    matches!(status, "WAIT" | "QUEUE" | "PENDING")
}

/// What a parsed rank payload means for the poll loop.
enum RankVerdict {
    Admitted(SessionCredential),
    KeepWaiting,
    /// The waiting room reported a status that is neither waiting nor
    /// admitted (queue closed, entry expired). Polling further is pointless.
    Terminal(String),
}

fn rank_verdict(
    rank: &RankResponse,
    ticket: &AdmissionTicket,
    ctx: &mut FlowContext,
) -> RankVerdict {
    if let Some(cred) = credential_from_rank(rank, ticket, ctx) {
        return RankVerdict::Admitted(cred);
    }
    match rank.status.as_deref() {
        Some(status) if !is_waiting_status(status) => RankVerdict::Terminal(status.to_string()),
        _ => RankVerdict::KeepWaiting,
    }
}

/// Build a credential from a rank payload, if it admits the flow.
///
/// The normal path is a payload carrying `sessionId`. Admitted payloads
/// without one get a synthesized id from local material, which beats failing
/// an already-granted admission.
fn credential_from_rank(
    rank: &RankResponse,
    ticket: &AdmissionTicket,
    ctx: &mut FlowContext,
) -> Option<SessionCredential> {
    if let Some(session_id) = &rank.session_id {
        if !session::looks_valid(session_id) {
            debug!(session_id = %session_id, "session id has unexpected shape");
        }
        return Some(SessionCredential {
            session_id: session_id.clone(),
            bridge_key: rank.key.clone().unwrap_or_default(),
            bridge_signature: rank.k.clone().unwrap_or_default(),
            redirect_hint: rank.redirect_url.clone(),
            obtained_at: Utc::now(),
        });
    }

    let admitted = rank
        .status
        .as_deref()
        .map(is_admitted_status)
        .unwrap_or(false);
    if admitted {
        let now = Utc::now();
        let session_id = session::synthesize_session_id(
            &ticket.goods_code,
            &ticket.member_key,
            now.timestamp_millis(),
        );
        warn!(session_id = %session_id, "admitted without a credential, synthesized session id");
        ctx.mark_degraded("credential synthesized from local material".to_string());
        return Some(SessionCredential {
            session_id,
            bridge_key: rank.key.clone().unwrap_or_default(),
            bridge_signature: rank.k.clone().unwrap_or_default(),
            redirect_hint: rank.redirect_url.clone(),
            obtained_at: now,
        });
    }

    None
}

// Waiting-room API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecureUrlRequest<'a> {
    biz_code: &'a str,
    secure_data: &'a str,
    signature: &'a str,
    goods_code: &'a str,
    pre_sales: &'a str,
    lang: &'a str,
    from: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecureUrlResponse {
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

impl SecureUrlResponse {
    fn entry_url(&self) -> Option<&str> {
        self.redirect_url.as_deref().or(self.secure_url.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct LineUpRequest<'a> {
    key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineUpResponse {
    waiting_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "myRank")]
    rank: Option<u32>,
    #[serde(default)]
    total_rank: Option<u32>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    k: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
}
