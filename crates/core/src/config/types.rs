use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
}

/// Base URLs of the external services a flow talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Waiting-room API base URL (secure-url, line-up, rank).
    pub waiting_url: String,
    /// Bridge API base URL (middleware/set-cookie).
    pub bridge_url: String,
    /// Inventory API base URL (zones, zone-detail, lock).
    pub inventory_url: String,
    /// Authoritative server-time endpoint. When absent or unreachable the
    /// clock offset is estimated from the session id instead.
    #[serde(default)]
    pub server_time_url: Option<String>,
    /// Value for the Origin/Referer headers the services expect.
    pub origin: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Pacing and budget options for one acquisition flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
    /// Business code forwarded on waiting-room and lock calls.
    #[serde(default = "default_biz_code")]
    pub biz_code: String,

    /// Language tag forwarded on waiting-room calls.
    #[serde(default = "default_language")]
    pub language: String,

    /// Channel tag sent in the channel header on inventory calls.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Rank poll interval in milliseconds (one in-flight request at a time).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Budget for the rank-poll phase in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Pause between full zone-scan rounds in milliseconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,

    /// Budget for the scan/lock phase in seconds.
    #[serde(default = "default_scan_timeout")]
    pub zone_scan_timeout_secs: u64,

    /// Overall flow deadline in seconds.
    #[serde(default = "default_flow_deadline")]
    pub flow_deadline_secs: u64,

    /// Skip units priced above this amount (minor currency units).
    #[serde(default)]
    pub price_ceiling: Option<u64>,
}

fn default_biz_code() -> String {
    "88889".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_channel() -> String {
    "WEB".to_string()
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_poll_timeout() -> u64 {
    300
}

fn default_scan_interval() -> u64 {
    3000
}

fn default_scan_timeout() -> u64 {
    300
}

fn default_flow_deadline() -> u64 {
    600
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            biz_code: default_biz_code(),
            language: default_language(),
            channel: default_channel(),
            poll_interval_ms: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            scan_interval_ms: default_scan_interval(),
            zone_scan_timeout_secs: default_scan_timeout(),
            flow_deadline_secs: default_flow_deadline(),
            price_ceiling: None,
        }
    }
}

/// Available handshake payload encodings.
///
/// The bridge endpoint's accepted wire format has never been confirmed
/// against a live environment, so the strategy stays configurable.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeStrategy {
    /// JSON array of credential fields, picked by length budget.
    CompactJson,
    /// 64-byte timestamp/digest/signature block, base64-encoded.
    #[default]
    BinaryBlock,
}

/// Handshake encoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    #[serde(default)]
    pub strategy: HandshakeStrategy,

    /// Target serialized size in bytes for the compact-json strategy.
    #[serde(default = "default_length_budget")]
    pub length_budget: usize,
}

fn default_length_budget() -> usize {
    90
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            strategy: HandshakeStrategy::default(),
            length_budget: default_length_budget(),
        }
    }
}

/// Bridge handshake behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Abort the flow when the handshake is rejected. Off by default:
    /// inventory calls have been observed to succeed after a failed
    /// handshake, so rejection only degrades the flow.
    #[serde(default)]
    pub required: bool,

    /// Warn when the estimated clock offset exceeds this (milliseconds).
    #[serde(default = "default_skew_warn")]
    pub skew_warn_ms: i64,
}

fn default_skew_warn() -> i64 {
    5000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            required: false,
            skew_warn_ms: default_skew_warn(),
        }
    }
}

/// Bot-mitigation challenge solving.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChallengeConfig {
    /// Attempt to solve the entry challenge. Solving is best-effort either
    /// way; failures never abort admission.
    #[serde(default)]
    pub enabled: bool,

    /// Site key passed to the solver, when known.
    #[serde(default)]
    pub site_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints_toml() -> &'static str {
        r#"
[endpoints]
waiting_url = "https://waiting.example.com/api"
bridge_url = "https://shop.example.com"
inventory_url = "https://shop.example.com/api"
origin = "https://shop.example.com"
"#
    }

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(endpoints_toml()).unwrap();
        assert_eq!(config.flow.poll_interval_ms, 3000);
        assert_eq!(config.flow.poll_timeout_secs, 300);
        assert_eq!(config.flow.biz_code, "88889");
        assert_eq!(config.endpoints.timeout_secs, 30);
        assert!(config.endpoints.server_time_url.is_none());
        assert_eq!(config.handshake.strategy, HandshakeStrategy::BinaryBlock);
        assert_eq!(config.handshake.length_budget, 90);
        assert!(!config.bridge.required);
        assert!(!config.challenge.enabled);
    }

    #[test]
    fn test_deserialize_missing_endpoints_fails() {
        let toml = r#"
[flow]
poll_interval_ms = 2000
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = format!(
            "{}{}",
            endpoints_toml(),
            r#"
[flow]
poll_interval_ms = 2000
poll_timeout_secs = 120
price_ceiling = 150000

[handshake]
strategy = "compact-json"
length_budget = 64

[bridge]
required = true
skew_warn_ms = 2000

[challenge]
enabled = true
site_key = "site-key-123"
"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.flow.poll_interval_ms, 2000);
        assert_eq!(config.flow.price_ceiling, Some(150000));
        assert_eq!(config.handshake.strategy, HandshakeStrategy::CompactJson);
        assert_eq!(config.handshake.length_budget, 64);
        assert!(config.bridge.required);
        assert_eq!(config.bridge.skew_warn_ms, 2000);
        assert!(config.challenge.enabled);
        assert_eq!(config.challenge.site_key, "site-key-123");
    }

    #[test]
    fn test_handshake_strategy_serialization() {
        assert_eq!(
            serde_json::to_string(&HandshakeStrategy::CompactJson).unwrap(),
            "\"compact-json\""
        );
        assert_eq!(
            serde_json::to_string(&HandshakeStrategy::BinaryBlock).unwrap(),
            "\"binary-block\""
        );
    }
}
