//! Session credentials issued by the waiting room.
//!
//! The session id is an opaque identifier, but the observed shape is
//! `{goodsCode}_M00000{member}{timestamp}` with the issue time embedded in
//! the tail. That embedded timestamp is used as a clock-offset fallback when
//! the server-time endpoint is unreachable, and the same shape is used to
//! synthesize a credential when an admitted rank response omits one.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Authorization material for the inventory domain, produced by the rank
/// poll once admission is granted.
///
/// `session_id` must stay byte-identical across every call made within one
/// flow; it is only ever cloned, never rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Opaque session identifier, echoed in a header on every inventory call.
    pub session_id: String,
    /// Key material for the bridge handshake payload.
    pub bridge_key: String,
    /// Server-issued signature accompanying the key.
    pub bridge_signature: String,
    /// URL to visit before the handshake (establishes server-side session).
    pub redirect_hint: Option<String>,
    /// When the credential was obtained locally.
    pub obtained_at: DateTime<Utc>,
}

static SESSION_ID_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+_[A-Z]\d+$").expect("session id pattern"));

/// Whether a session id matches the shape observed in live traffic.
///
/// Advisory only: the id is server-authoritative, so an unexpected shape is
/// logged, never rejected.
pub fn looks_valid(session_id: &str) -> bool {
    (10..=100).contains(&session_id.len()) && SESSION_ID_SHAPE.is_match(session_id)
}

/// Extract the issue timestamp embedded in a session id, in epoch millis.
///
/// The member segment ends in a 10-digit epoch-seconds timestamp. Returns
/// `None` when the id does not carry one.
pub fn embedded_timestamp_ms(session_id: &str) -> Option<i64> {
    let member_part = session_id.split('_').nth(1)?;
    let digits: String = member_part.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return None;
    }
    let seconds: i64 = digits[digits.len() - 10..].parse().ok()?;
    // Reject tails that cannot be a plausible epoch (before ~2001).
    if seconds < 1_000_000_000 {
        return None;
    }
    Some(seconds * 1000)
}

/// Build a session id of the observed shape from local material.
///
/// Used as a last resort when the rank poll admits the flow without handing
/// out a credential: `{goods}_M00000{member:0>8}{now_ms}`.
pub fn synthesize_session_id(goods_code: &str, member_key: &str, now_ms: i64) -> String {
    let digits: String = member_key.chars().filter(|c| c.is_ascii_digit()).collect();
    let member: String = if digits.len() >= 8 {
        digits[digits.len() - 8..].to_string()
    } else {
        format!("{:0>8}", digits)
    };
    format!("{}_M00000{}{}", goods_code, member, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_valid_observed_shape() {
        assert!(looks_valid("25018223_M0000000751971768530066"));
    }

    #[test]
    fn test_looks_valid_rejects_junk() {
        assert!(!looks_valid(""));
        assert!(!looks_valid("no-underscore"));
        assert!(!looks_valid("G1_S1")); // too short, advisory shape only
    }

    #[test]
    fn test_embedded_timestamp_from_tail() {
        // Tail is 1768530066 seconds.
        let ts = embedded_timestamp_ms("25018223_M0000000751971768530066");
        assert_eq!(ts, Some(1_768_530_066_000));
    }

    #[test]
    fn test_embedded_timestamp_missing() {
        assert_eq!(embedded_timestamp_ms("25018223"), None);
        assert_eq!(embedded_timestamp_ms("25018223_M123"), None);
        // Ten digits but not a plausible epoch.
        assert_eq!(embedded_timestamp_ms("25018223_M0000000001"), None);
    }

    #[test]
    fn test_synthesize_pads_member_to_eight_digits() {
        let id = synthesize_session_id("25018223", "751", 1_768_530_066_000);
        assert_eq!(id, "25018223_M00000000007511768530066000");
        assert!(id.starts_with("25018223_M00000"));
    }

    #[test]
    fn test_synthesize_takes_last_eight_member_digits() {
        let id = synthesize_session_id("G100", "M000001234567890", 1_700_000_000_000);
        assert!(id.starts_with("G100_M0000034567890"));
    }

    #[test]
    fn test_credential_serialization_round_trip() {
        let cred = SessionCredential {
            session_id: "25018223_M0000000751971768530066".to_string(),
            bridge_key: "bridge-key".to_string(),
            bridge_signature: "sig".to_string(),
            redirect_hint: Some("https://example.com/enter?key=abc".to_string()),
            obtained_at: Utc::now(),
        };
        let json = serde_json::to_string(&cred).unwrap();
        let parsed: SessionCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cred);
    }
}
