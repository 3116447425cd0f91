//! The guarded HTTP transport.
//!
//! Every outbound request in the process flows through one shared
//! [`GuardedClient`]; the core never constructs bare clients. The wrapper
//! consults the boundary protector before dispatching each request, so a
//! denied destination fails the surrounding HTTP call with
//! [`BoundaryError::Blocked`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::warn;
use url::Url;

use crate::error::{BoundaryError, BoundaryResult};
use crate::protector::{BoundaryProtector, global_protector};

/// An HTTP client whose every request is checked by the protector.
pub struct GuardedClient {
    client: reqwest::Client,
    protector: Arc<BoundaryProtector>,
    enforced: AtomicBool,
}

impl GuardedClient {
    /// Build a guarded client over the given protector.
    ///
    /// Enforcement starts enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new(protector: Arc<BoundaryProtector>) -> BoundaryResult<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()?;
        Ok(Self {
            client,
            protector,
            enforced: AtomicBool::new(true),
        })
    }

    /// Whether enforcement is active.
    #[must_use]
    pub fn is_enforced(&self) -> bool {
        self.enforced.load(Ordering::SeqCst)
    }

    /// Enable enforcement.
    pub fn enable(&self) {
        self.enforced.store(true, Ordering::SeqCst);
    }

    /// Disable enforcement. Testing only; logged loudly.
    pub fn disable(&self) {
        warn!("boundary enforcement DISABLED; all egress is unchecked");
        self.enforced.store(false, Ordering::SeqCst);
    }

    /// Check a URL against the protector without sending anything.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Blocked`] or [`BoundaryError::MissingHost`].
    pub fn check_url(&self, url: &Url) -> BoundaryResult<()> {
        if !self.is_enforced() {
            return Ok(());
        }
        let host = url
            .host_str()
            .ok_or_else(|| BoundaryError::MissingHost(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(443);
        self.protector.check(host, port)
    }

    /// Send a GET request to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Blocked`] if the destination is denied, or
    /// the transport error otherwise.
    pub async fn get(&self, url: &str) -> BoundaryResult<reqwest::Response> {
        let parsed = Url::parse(url)?;
        self.check_url(&parsed)?;
        Ok(self.client.get(parsed).send().await?)
    }

    /// Execute a pre-built request.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Blocked`] if the destination is denied, or
    /// the transport error otherwise.
    pub async fn execute(&self, request: reqwest::Request) -> BoundaryResult<reqwest::Response> {
        self.check_url(request.url())?;
        Ok(self.client.execute(request).await?)
    }

}

static CLIENT: OnceLock<Arc<GuardedClient>> = OnceLock::new();

fn client_cell() -> &'static Arc<GuardedClient> {
    CLIENT.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Arc::new(
            GuardedClient::new(global_protector())
                .expect("default TLS backend must be constructible"),
        )
    })
}

/// The process-wide guarded client.
///
/// All egress must use this handle; constructing bare clients bypasses
/// the boundary and is forbidden in the core.
#[must_use]
pub fn http_client() -> Arc<GuardedClient> {
    Arc::clone(client_cell())
}

/// Enable enforcement on the process-wide client.
///
/// Call once at startup after the protector's policy is installed.
pub fn enforce_transport() {
    client_cell().enable();
}

/// Disable enforcement on the process-wide client. Testing only.
pub fn disable_enforcement() {
    client_cell().disable();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NetworkPolicy;
    use rigrun_audit::{AuditEmitter, MemorySink};

    fn guarded(policy: NetworkPolicy) -> GuardedClient {
        let emitter = Arc::new(AuditEmitter::new(Arc::new(MemorySink::new())));
        let protector = Arc::new(BoundaryProtector::with_policy(policy, emitter));
        GuardedClient::new(protector).unwrap()
    }

    fn allow_example() -> NetworkPolicy {
        NetworkPolicy {
            allowed_hosts: vec!["*.example.com".to_owned()],
            ..Default::default()
        }
    }

    #[test]
    fn test_check_url_allows_listed_host() {
        let client = guarded(allow_example());
        let url = Url::parse("https://api.example.com/v1").unwrap();
        client.check_url(&url).unwrap();
    }

    #[test]
    fn test_check_url_blocks_unlisted_host() {
        let client = guarded(allow_example());
        let url = Url::parse("https://evil.test/").unwrap();
        assert!(matches!(
            client.check_url(&url),
            Err(BoundaryError::Blocked {
                reason: "host_not_allowed",
                ..
            })
        ));
    }

    #[test]
    fn test_check_url_blocks_odd_port() {
        let client = guarded(allow_example());
        let url = Url::parse("https://api.example.com:8443/").unwrap();
        assert!(matches!(
            client.check_url(&url),
            Err(BoundaryError::Blocked {
                reason: "port_not_allowed",
                ..
            })
        ));
    }

    #[test]
    fn test_default_port_is_inferred() {
        let client = guarded(allow_example());
        // No explicit port: https defaults to 443, which the policy allows.
        let url = Url::parse("https://example.com/path").unwrap();
        client.check_url(&url).unwrap();
    }

    #[tokio::test]
    async fn test_get_fails_with_blocked_before_any_io() {
        let client = guarded(allow_example());
        let err = client.get("https://evil.test/").await.unwrap_err();
        assert!(matches!(err, BoundaryError::Blocked { .. }));
    }

    #[test]
    fn test_disable_enforcement_skips_checks() {
        let client = guarded(NetworkPolicy::default());
        let url = Url::parse("https://anything.test/").unwrap();
        assert!(client.check_url(&url).is_err());

        client.disable();
        assert!(client.check_url(&url).is_ok());

        client.enable();
        assert!(client.check_url(&url).is_err());
    }
}
