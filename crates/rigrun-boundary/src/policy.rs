//! The network policy and its matching rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Egress policy: which hosts and ports outbound requests may reach.
///
/// `default_allow` is hard-wired false. The field exists only so that a
/// tampered file setting it to `true` can be detected and overwritten on
/// load; it is never honored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    /// Allowed host patterns: exact (`example.com`), wildcard
    /// (`*.example.com`), or suffix (`.example.com`).
    pub allowed_hosts: Vec<String>,
    /// Explicitly blocked host patterns, same forms as `allowed_hosts`.
    pub blocked_hosts: Vec<String>,
    /// Allowed destination ports.
    pub allowed_ports: Vec<u16>,
    /// Pinned certificates: host → SHA-256 fingerprint.
    pub pinned_certificates: HashMap<String, String>,
    /// When the policy was last updated.
    pub updated_at: DateTime<Utc>,
    /// Never honored; see the struct docs.
    pub(crate) default_allow: bool,
}

impl Default for NetworkPolicy {
    /// The built-in default-deny policy: no hosts, HTTPS port only.
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            blocked_hosts: Vec::new(),
            allowed_ports: vec![443],
            pinned_certificates: HashMap::new(),
            updated_at: Utc::now(),
            default_allow: false,
        }
    }
}

impl NetworkPolicy {
    /// Whether the persisted file carried `default_allow = true`.
    ///
    /// Used by the loader to log the overwrite; the flag itself is forced
    /// back to false by [`NetworkPolicy::normalize`].
    #[must_use]
    pub fn default_allow_was_set(&self) -> bool {
        self.default_allow
    }

    /// Force `default_allow` to false. Returns true if it was set.
    pub fn normalize(&mut self) -> bool {
        let was_set = self.default_allow;
        self.default_allow = false;
        was_set
    }

    /// Whether `host` matches any allow entry.
    #[must_use]
    pub fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|pattern| host_matches(pattern, host))
    }

    /// Whether `host` matches any block entry.
    #[must_use]
    pub fn host_blocked(&self, host: &str) -> bool {
        self.blocked_hosts
            .iter()
            .any(|pattern| host_matches(pattern, host))
    }

    /// Whether `port` is in the allow list.
    #[must_use]
    pub fn port_allowed(&self, port: u16) -> bool {
        self.allowed_ports.contains(&port)
    }
}

/// Match a host against one pattern.
///
/// - exact: `example.com` matches only `example.com`
/// - wildcard: `*.example.com` matches `a.example.com` and `example.com`,
///   never `badexample.com`
/// - suffix: `.example.com` behaves like the wildcard form
fn host_matches(pattern: &str, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix("*.") {
        host == suffix || host.ends_with(&format!(".{suffix}"))
    } else if let Some(suffix) = pattern.strip_prefix('.') {
        host == suffix || host.ends_with(&format!(".{suffix}"))
    } else {
        host == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with(allowed: &[&str], blocked: &[&str]) -> NetworkPolicy {
        NetworkPolicy {
            allowed_hosts: allowed.iter().map(|s| (*s).to_owned()).collect(),
            blocked_hosts: blocked.iter().map(|s| (*s).to_owned()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_deny_everything() {
        let policy = NetworkPolicy::default();
        assert!(!policy.host_allowed("example.com"));
        assert!(policy.port_allowed(443));
        assert!(!policy.port_allowed(80));
        assert!(!policy.default_allow_was_set());
    }

    #[test]
    fn test_exact_match() {
        let policy = policy_with(&["example.com"], &[]);
        assert!(policy.host_allowed("example.com"));
        assert!(policy.host_allowed("EXAMPLE.COM"));
        assert!(!policy.host_allowed("a.example.com"));
        assert!(!policy.host_allowed("badexample.com"));
    }

    #[test]
    fn test_wildcard_match() {
        let policy = policy_with(&["*.example.com"], &[]);
        assert!(policy.host_allowed("a.example.com"));
        assert!(policy.host_allowed("deep.a.example.com"));
        // The bare domain is covered by its own wildcard.
        assert!(policy.host_allowed("example.com"));
        assert!(!policy.host_allowed("badexample.com"));
    }

    #[test]
    fn test_dot_suffix_match() {
        let policy = policy_with(&[".example.com"], &[]);
        assert!(policy.host_allowed("a.example.com"));
        assert!(policy.host_allowed("example.com"));
        assert!(!policy.host_allowed("badexample.com"));
    }

    #[test]
    fn test_blocked_hosts_use_same_forms() {
        let policy = policy_with(&["*.example.com"], &["evil.example.com"]);
        assert!(policy.host_blocked("evil.example.com"));
        assert!(!policy.host_blocked("good.example.com"));
    }

    #[test]
    fn test_normalize_clears_default_allow() {
        let json = r#"{"allowed_hosts":[],"blocked_hosts":[],"allowed_ports":[443],
            "pinned_certificates":{},"updated_at":"2026-01-01T00:00:00Z",
            "default_allow":true}"#;
        let mut policy: NetworkPolicy = serde_json::from_str(json).unwrap();
        assert!(policy.default_allow_was_set());
        assert!(policy.normalize());
        assert!(!policy.default_allow_was_set());
        assert!(!policy.normalize());
    }

    #[test]
    fn test_serde_roundtrip() {
        let policy = policy_with(&["*.example.com"], &["evil.test"]);
        let json = serde_json::to_string(&policy).unwrap();
        let back: NetworkPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.allowed_hosts, policy.allowed_hosts);
        assert_eq!(back.allowed_ports, policy.allowed_ports);
    }
}
