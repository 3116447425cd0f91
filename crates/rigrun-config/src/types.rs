//! Configuration types.
//!
//! Every struct implements [`Default`] with safe, local-only production
//! values so that a bare `[section]` header in TOML produces a working
//! configuration. Secrets (cloud API key, policy key) are omitted from
//! serialization and redacted in `Debug` output.

use std::collections::HashMap;

use rigrun_core::{ClassificationLevel, Tier};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the rigrun core.
///
/// Loaded once from `~/.rigrun/config.{toml,json}` with environment
/// variable overrides applied last; immutable after publication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query routing behaviour.
    pub routing: RoutingSection,
    /// Local model host settings.
    pub local: LocalSection,
    /// Cloud provider settings.
    pub cloud: CloudSection,
    /// Security policy (classification, lockout, TLS, policy key).
    pub security: SecuritySection,
    /// Response cache settings.
    pub cache: CacheSection,
    /// Frontend settings, opaque to the core.
    pub ui: toml::Table,
}

// ---------------------------------------------------------------------------
// RoutingSection
// ---------------------------------------------------------------------------

/// Query routing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    /// Routing mode: `auto`, `local`, `cloud`, or the legacy alias
    /// `hybrid` (rewritten to `auto` on load).
    pub default_mode: String,
    /// Hard upper bound on the chosen tier.
    pub max_tier: Tier,
    /// Refuse every non-local tier.
    pub paranoid: bool,
    /// Permit only local-host endpoints.
    pub offline: bool,
    /// In auto mode, prefer local when complexity allows it.
    pub auto_prefer_local: bool,
    /// Per-query cost cap in cents for auto mode. Zero disables the cap.
    pub auto_max_cost: f64,
    /// What to do when the cost cap is exceeded: `local` (de-escalate)
    /// or `error` (surface the failure).
    pub auto_fallback: Option<String>,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            default_mode: "auto".to_owned(),
            max_tier: Tier::Opus,
            paranoid: false,
            offline: false,
            auto_prefer_local: true,
            auto_max_cost: 10.0,
            auto_fallback: Some("local".to_owned()),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalSection
// ---------------------------------------------------------------------------

/// Local model host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSection {
    /// Model endpoint URL.
    pub endpoint: String,
    /// Default model name.
    pub default_model: String,
}

impl Default for LocalSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_owned(),
            default_model: "llama3.1:8b".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// CloudSection
// ---------------------------------------------------------------------------

/// Cloud provider settings.
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct CloudSection {
    /// API key. Prefer the environment over storing this in a file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Default cloud model name.
    pub default_model: String,
}

impl std::fmt::Debug for CloudSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSection")
            .field("has_api_key", &self.api_key.is_some())
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl Serialize for CloudSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CloudSection", 1)?;
        // api_key is intentionally omitted.
        state.serialize_field("default_model", &self.default_model)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// SecuritySection
// ---------------------------------------------------------------------------

/// Security policy settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Idle session timeout in seconds. Valid range 900–1800.
    pub session_timeout_secs: u64,
    /// Failed attempts before lockout. Valid range 3–10.
    pub max_login_attempts: u32,
    /// Lockout duration in minutes. Valid range 1–60.
    pub lockout_duration_minutes: u64,
    /// Authenticated session lifetime in hours. Valid range 1–24.
    pub auth_session_duration_hours: u64,
    /// Minimum TLS version: `TLS1.2` or `TLS1.3` (bare `1.2`/`1.3`
    /// accepted and migrated on load).
    pub tls_min_version: String,
    /// Action on suspected spillage: `warn`, `block`, or `sanitize`.
    pub spillage_action: String,
    /// Session classification marking.
    pub classification: String,
    /// HMAC key for signing the network policy. Prefer `POLICY_KEY` in
    /// the environment over storing this in a file.
    #[serde(skip_serializing)]
    pub policy_key: Option<String>,
    /// Encrypt persisted conversation state at rest.
    pub encrypt_at_rest: bool,
    /// Encrypt the audit log.
    pub encrypt_audit_log: bool,
    /// Pinned certificates: host → SHA-256 fingerprint.
    pub pinned_certificates: HashMap<String, String>,
}

impl SecuritySection {
    /// Parse the configured classification marking.
    ///
    /// Falls back to `UNCLASSIFIED` if the string is unparseable; the
    /// validator rejects such configs before they are published.
    #[must_use]
    pub fn classification_level(&self) -> ClassificationLevel {
        self.classification.parse().unwrap_or_default()
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            session_timeout_secs: 900,
            max_login_attempts: 3,
            lockout_duration_minutes: 15,
            auth_session_duration_hours: 12,
            tls_min_version: "TLS1.2".to_owned(),
            spillage_action: "warn".to_owned(),
            classification: "UNCLASSIFIED".to_owned(),
            policy_key: None,
            encrypt_at_rest: false,
            encrypt_audit_log: false,
            pinned_certificates: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for SecuritySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySection")
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field("max_login_attempts", &self.max_login_attempts)
            .field("lockout_duration_minutes", &self.lockout_duration_minutes)
            .field(
                "auth_session_duration_hours",
                &self.auth_session_duration_hours,
            )
            .field("tls_min_version", &self.tls_min_version)
            .field("spillage_action", &self.spillage_action)
            .field("classification", &self.classification)
            .field("has_policy_key", &self.policy_key.is_some())
            .field("encrypt_at_rest", &self.encrypt_at_rest)
            .field("encrypt_audit_log", &self.encrypt_audit_log)
            .field("pinned_certificates", &self.pinned_certificates)
            .finish()
    }
}

impl Serialize for SecuritySection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SecuritySection", 10)?;
        state.serialize_field("session_timeout_secs", &self.session_timeout_secs)?;
        state.serialize_field("max_login_attempts", &self.max_login_attempts)?;
        state.serialize_field("lockout_duration_minutes", &self.lockout_duration_minutes)?;
        state.serialize_field(
            "auth_session_duration_hours",
            &self.auth_session_duration_hours,
        )?;
        state.serialize_field("tls_min_version", &self.tls_min_version)?;
        state.serialize_field("spillage_action", &self.spillage_action)?;
        state.serialize_field("classification", &self.classification)?;
        // policy_key is intentionally omitted.
        state.serialize_field("encrypt_at_rest", &self.encrypt_at_rest)?;
        state.serialize_field("encrypt_audit_log", &self.encrypt_audit_log)?;
        state.serialize_field("pinned_certificates", &self.pinned_certificates)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// CacheSection
// ---------------------------------------------------------------------------

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Whether the cache is consulted at all.
    pub enabled: bool,
    /// Entry time-to-live in hours.
    pub ttl_hours: u64,
    /// Maximum number of entries. Valid range 0–100 000.
    pub max_size: u64,
    /// Similarity threshold for semantic hits. Valid range 0–1.
    pub semantic_threshold: f64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            max_size: 10_000,
            semantic_threshold: 0.85,
        }
    }
}
