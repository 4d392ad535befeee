//! Flow-scoped HTTP transport.
//!
//! Each flow owns one `reqwest::Client` with its own cookie jar: the bridge
//! handshake and challenge steps set cookies that later inventory calls must
//! carry, and none of that state may leak between concurrent flows. The
//! handle is cheap to clone and is shared by every phase component of the
//! same flow.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use tracing::warn;

/// Header carrying the session id on bridge/inventory calls.
pub const SESSION_HEADER: &str = "x-session-id";
/// Header carrying the per-flow trace id.
pub const TRACE_HEADER: &str = "x-trace-id";
/// Header carrying the sales-channel tag on inventory calls.
pub const CHANNEL_HEADER: &str = "x-channel";

/// One flow's HTTP client plus a handle to its cookie jar.
#[derive(Clone)]
pub struct FlowTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl FlowTransport {
    /// Build a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, jar }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Install a cookie for the host of `base_url` (e.g. a solved challenge
    /// token). Invalid URLs are logged and skipped.
    pub fn set_cookie(&self, base_url: &str, name: &str, value: &str) {
        match Url::parse(base_url) {
            Ok(url) => {
                self.jar.add_cookie_str(&format!("{}={}", name, value), &url);
            }
            Err(e) => {
                warn!(url = base_url, error = %e, "cannot set cookie on invalid URL");
            }
        }
    }
}

impl std::fmt::Debug for FlowTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_builds_and_clones() {
        let transport = FlowTransport::new(Duration::from_secs(5));
        let clone = transport.clone();
        // Both handles point at the same underlying client/jar.
        clone.set_cookie("https://example.com", "token", "abc");
        let _ = transport.client();
    }

    #[tokio::test]
    async fn test_set_cookie_invalid_url_does_not_panic() {
        let transport = FlowTransport::new(Duration::from_secs(5));
        transport.set_cookie("not a url", "token", "abc");
    }
}
