//! The boundary protector and its bounded decision log.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, RwLock};

use chrono::{DateTime, Utc};
use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_core::SessionId;
use tracing::warn;

use crate::error::{BoundaryError, BoundaryResult};
use crate::policy::NetworkPolicy;

/// Maximum retained connection decisions.
const LOG_CAPACITY: usize = 10_000;

/// One allow/deny decision, retained in the in-memory ring.
#[derive(Debug, Clone)]
pub struct ConnectionDecision {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Destination host.
    pub host: String,
    /// Destination port.
    pub port: u16,
    /// Whether the connection was allowed.
    pub allowed: bool,
    /// Machine-readable reason for denials, `allowed` otherwise.
    pub reason: &'static str,
}

struct Inner {
    policy: NetworkPolicy,
    log: VecDeque<ConnectionDecision>,
}

/// Enforces the network policy on every outbound connection.
///
/// All decisions land in a bounded in-memory ring (≤ 10 000 entries);
/// blocks are additionally audited as `BOUNDARY_CONNECTION_BLOCKED`.
pub struct BoundaryProtector {
    inner: RwLock<Inner>,
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
}

impl BoundaryProtector {
    /// Create a protector with the built-in default-deny policy.
    #[must_use]
    pub fn new(emitter: Arc<AuditEmitter>) -> Self {
        Self::with_policy(NetworkPolicy::default(), emitter)
    }

    /// Create a protector over an explicit policy.
    #[must_use]
    pub fn with_policy(policy: NetworkPolicy, emitter: Arc<AuditEmitter>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                policy,
                log: VecDeque::new(),
            }),
            emitter,
            session_id: SessionId::new(),
        }
    }

    /// Replace the active policy.
    pub fn set_policy(&self, mut policy: NetworkPolicy) {
        policy.normalize();
        if let Ok(mut inner) = self.inner.write() {
            inner.policy = policy;
        }
    }

    /// Snapshot of the active policy.
    #[must_use]
    pub fn policy(&self) -> NetworkPolicy {
        self.inner
            .read()
            .map(|inner| inner.policy.clone())
            .unwrap_or_default()
    }

    /// Check one outbound connection.
    ///
    /// A request is accepted iff the host matches an allow entry, is not
    /// explicitly blocked, and the port is in the allow list.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Blocked`] with a machine-readable reason.
    pub fn check(&self, host: &str, port: u16) -> BoundaryResult<()> {
        let verdict = {
            let Ok(inner) = self.inner.read() else {
                return Err(BoundaryError::Blocked {
                    host: host.to_owned(),
                    port,
                    reason: "protector_unavailable",
                });
            };
            if !inner.policy.host_allowed(host) {
                Err("host_not_allowed")
            } else if inner.policy.host_blocked(host) {
                Err("host_blocked")
            } else if !inner.policy.port_allowed(port) {
                Err("port_not_allowed")
            } else {
                Ok(())
            }
        };

        match verdict {
            Ok(()) => {
                self.record(host, port, true, "allowed");
                Ok(())
            },
            Err(reason) => {
                self.record(host, port, false, reason);
                warn!(host, port, reason, "outbound connection blocked");
                self.emitter.emit(
                    AuditEvent::new(
                        AuditKind::BoundaryConnectionBlocked,
                        self.session_id.clone(),
                    )
                    .with_metadata("host", host)
                    .with_metadata("port", port.to_string())
                    .with_metadata("reason", reason)
                    .failed(),
                );
                Err(BoundaryError::Blocked {
                    host: host.to_owned(),
                    port,
                    reason,
                })
            },
        }
    }

    /// Snapshot of the connection log, oldest first.
    #[must_use]
    pub fn connection_log(&self) -> Vec<ConnectionDecision> {
        self.inner
            .read()
            .map(|inner| inner.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, host: &str, port: u16, allowed: bool, reason: &'static str) {
        if let Ok(mut inner) = self.inner.write() {
            if inner.log.len() >= LOG_CAPACITY {
                inner.log.pop_front();
            }
            inner.log.push_back(ConnectionDecision {
                timestamp: Utc::now(),
                host: host.to_owned(),
                port,
                allowed,
                reason,
            });
        }
    }
}

static GLOBAL: OnceLock<Arc<BoundaryProtector>> = OnceLock::new();

/// The process-wide protector, created on first use with the built-in
/// default-deny policy and the global audit emitter.
pub fn global_protector() -> Arc<BoundaryProtector> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(BoundaryProtector::new(rigrun_audit::global()))))
}
