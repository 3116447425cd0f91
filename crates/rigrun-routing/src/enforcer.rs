//! Classification-level enforcement.

use std::sync::Arc;

use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_core::{ClassificationLevel, SessionId, Tier};
use tracing::warn;

/// Gates routing decisions on the session classification level.
///
/// Pure except for audit emission when a rewrite occurs.
pub struct Enforcer {
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
}

impl Enforcer {
    /// Create an enforcer bound to a session.
    #[must_use]
    pub fn new(emitter: Arc<AuditEmitter>, session_id: SessionId) -> Self {
        Self {
            emitter,
            session_id,
        }
    }

    /// Whether queries at `level` may reach a cloud tier.
    ///
    /// True only for `UNCLASSIFIED`.
    #[must_use]
    pub fn can_route_to_cloud(level: ClassificationLevel) -> bool {
        level.can_route_to_cloud()
    }

    /// Whether `level` forces local-only routing (any level ≥ CUI).
    #[must_use]
    pub fn requires_local_only(level: ClassificationLevel) -> bool {
        level.requires_local_only()
    }

    /// Clamp `requested` to what `level` allows.
    ///
    /// Returns the allowed tier and whether a rewrite was applied. A
    /// rewrite emits a `CLASSIFICATION_ENFORCED` audit event carrying the
    /// original and enforced tiers.
    #[must_use]
    pub fn enforce_routing(&self, level: ClassificationLevel, requested: Tier) -> (Tier, bool) {
        let ceiling = level.max_allowed_tier();
        if requested <= ceiling {
            return (requested, false);
        }

        warn!(
            classification = %level,
            requested = %requested,
            enforced = %ceiling,
            "classification enforcement rewrote tier"
        );
        self.emitter.emit(
            AuditEvent::new(AuditKind::ClassificationEnforced, self.session_id.clone())
                .with_tier(ceiling)
                .with_metadata("classification", level.as_str())
                .with_metadata("original_tier", requested.as_str())
                .with_metadata("enforced_tier", ceiling.as_str()),
        );
        (ceiling, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigrun_audit::MemorySink;

    fn enforcer() -> (Arc<MemorySink>, Enforcer) {
        let sink = Arc::new(MemorySink::new());
        let emitter = Arc::new(AuditEmitter::new(sink.clone()));
        (sink, Enforcer::new(emitter, SessionId::new()))
    }

    #[test]
    fn test_cloud_gate() {
        assert!(Enforcer::can_route_to_cloud(
            ClassificationLevel::Unclassified
        ));
        assert!(!Enforcer::can_route_to_cloud(ClassificationLevel::Cui));
        assert!(!Enforcer::can_route_to_cloud(ClassificationLevel::Secret));
    }

    #[test]
    fn test_unclassified_passes_through() {
        let (sink, enforcer) = enforcer();
        let (tier, rewritten) =
            enforcer.enforce_routing(ClassificationLevel::Unclassified, Tier::Opus);
        assert_eq!(tier, Tier::Opus);
        assert!(!rewritten);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_cui_clamps_to_local_and_audits() {
        let (sink, enforcer) = enforcer();
        let (tier, rewritten) = enforcer.enforce_routing(ClassificationLevel::Cui, Tier::Sonnet);
        assert_eq!(tier, Tier::Local);
        assert!(rewritten);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditKind::ClassificationEnforced);
        assert_eq!(events[0].metadata["original_tier"], "sonnet");
        assert_eq!(events[0].metadata["enforced_tier"], "local");
    }

    #[test]
    fn test_local_request_never_rewritten() {
        let (sink, enforcer) = enforcer();
        let (tier, rewritten) =
            enforcer.enforce_routing(ClassificationLevel::TopSecret, Tier::Local);
        assert_eq!(tier, Tier::Local);
        assert!(!rewritten);
        assert!(sink.events().is_empty());
    }
}
