//! Audit event records and the event-type vocabulary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rigrun_core::{SessionId, Tier};
use serde::{Deserialize, Serialize};

/// Metadata keys whose values are always redacted in stringified output.
const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "policy_key",
    "hmac_key",
    "openrouter_key",
    "token",
    "secret",
];

/// The event types the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// A routing decision was made for a query.
    RoutingDecision,
    /// Classification enforcement rewrote a requested tier.
    ClassificationEnforced,
    /// The auto-mode cost cap rejected or de-escalated a route.
    CostCapExceeded,
    /// A signed network policy was loaded successfully.
    PolicyLoaded,
    /// A network policy file failed signature verification.
    PolicyTamperDetected,
    /// A network policy was signed and persisted.
    PolicyUpdated,
    /// The boundary protector blocked an outbound connection.
    BoundaryConnectionBlocked,
    /// An identifier crossed the failed-attempt threshold.
    AuthLockout,
    /// An authentication operation was refused in paranoid mode.
    AuthBlockedParanoid,
    /// A component entered paranoid mode after detecting tampering.
    ParanoidModeSet,
    /// An operator explicitly cleared paranoid mode.
    ParanoidModeCleared,
    /// The task notification channel overflowed and dropped its oldest entry.
    TaskNotificationDropped,
    /// A task reached a terminal state.
    TaskCompleted,
    /// A plan reached a terminal state.
    PlanCompleted,
}

impl AuditKind {
    /// Wire form of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoutingDecision => "ROUTING_DECISION",
            Self::ClassificationEnforced => "CLASSIFICATION_ENFORCED",
            Self::CostCapExceeded => "COST_CAP_EXCEEDED",
            Self::PolicyLoaded => "POLICY_LOADED",
            Self::PolicyTamperDetected => "POLICY_TAMPER_DETECTED",
            Self::PolicyUpdated => "POLICY_UPDATED",
            Self::BoundaryConnectionBlocked => "BOUNDARY_CONNECTION_BLOCKED",
            Self::AuthLockout => "AUTH_LOCKOUT",
            Self::AuthBlockedParanoid => "AUTH_BLOCKED_PARANOID",
            Self::ParanoidModeSet => "PARANOID_MODE_SET",
            Self::ParanoidModeCleared => "PARANOID_MODE_CLEARED",
            Self::TaskNotificationDropped => "TASK_NOTIFICATION_DROPPED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::PlanCompleted => "PLAN_COMPLETED",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit record, serialized as one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event type.
    pub event_type: AuditKind,
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Routing tier, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// The query, where applicable. Never a classified payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Token count, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    /// Cost in cents, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Whether the audited operation succeeded.
    pub success: bool,
    /// Free-form string metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl AuditEvent {
    /// Create a successful event of the given kind.
    #[must_use]
    pub fn new(event_type: AuditKind, session_id: SessionId) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            session_id,
            tier: None,
            query: None,
            tokens: None,
            cost: None,
            success: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Set the query text.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the token count.
    #[must_use]
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the cost in cents.
    #[must_use]
    pub fn with_cost(mut self, cost_cents: f64) -> Self {
        self.cost = Some(cost_cents);
        self
    }

    /// Mark the event as failed.
    #[must_use]
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Serialize to a single JSON line with sensitive values redacted.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the event cannot be encoded.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut redacted = self.clone();
        for (key, value) in &mut redacted.metadata {
            let lowered = key.to_ascii_lowercase();
            if SENSITIVE_KEYS.iter().any(|s| lowered.contains(s)) {
                *value = "[REDACTED]".to_owned();
            }
        }
        serde_json::to_string(&redacted)
    }
}
