//! The query router.
//!
//! `route` combines the complexity classifier, routing mode, the paranoid
//! and offline flags, the max-tier cap, classification enforcement, and
//! the auto-mode cost cap into a single [`RoutingDecision`] with a
//! one-sentence human-readable reason.

use std::sync::Arc;

use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_config::Config;
use rigrun_core::{Classification, SessionId, Tier};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::complexity::{Complexity, QueryType, classify, classify_query_type};
use crate::enforcer::Enforcer;
use crate::error::{RouteError, RouteResult};

/// Flat token overhead assumed for the model's response when estimating
/// cost from the query alone.
const RESPONSE_TOKEN_OVERHEAD: u64 = 256;

/// An externally-detected cache hit supplied by the caller.
#[derive(Debug, Clone)]
pub struct CacheHitResult {
    /// Similarity score of the hit, 0–1.
    pub similarity: f64,
}

/// Per-call options layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Override the configured routing mode.
    pub mode: Option<String>,
    /// Force paranoid handling for this call.
    pub paranoid: bool,
    /// Force offline handling for this call.
    pub offline: bool,
    /// Token estimate from the caller; derived from the query when absent.
    pub estimated_tokens: Option<u64>,
    /// A cache hit detected by the caller.
    pub cache_hit: Option<CacheHitResult>,
}

/// An alternative tier the frontend may offer in auto mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoOption {
    /// The alternative tier.
    pub tier: Tier,
    /// Its estimated cost in cents.
    pub estimated_cost_cents: f64,
}

/// The outcome of a routing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The chosen tier.
    pub tier: Tier,
    /// Classifier output for the query.
    pub complexity: Complexity,
    /// Coarse query category. Informational only.
    pub query_type: QueryType,
    /// One-sentence human-readable explanation.
    pub reason: String,
    /// Estimated cost of serving at `tier`, in cents.
    pub estimated_cost_cents: f64,
    /// Whether classification enforcement rewrote the tier.
    pub enforcement_applied: bool,
    /// Alternative tiers, populated only in auto mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_options: Option<Vec<AutoOption>>,
}

/// Routes queries to tiers under the configured policy.
pub struct Router {
    config: Arc<Config>,
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
    enforcer: Enforcer,
}

impl Router {
    /// Create a router over the given configuration and audit emitter.
    #[must_use]
    pub fn new(config: Arc<Config>, emitter: Arc<AuditEmitter>, session_id: SessionId) -> Self {
        let enforcer = Enforcer::new(Arc::clone(&emitter), session_id.clone());
        Self {
            config,
            emitter,
            session_id,
            enforcer,
        }
    }

    /// Route a query.
    ///
    /// Stages, in order: complexity → mode → paranoid → offline →
    /// max-tier cap → classification enforcement → cost cap.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] when the constraints cannot be satisfied:
    /// an explicit cloud demand under a classification, paranoid or
    /// offline flag, or a cost-cap overrun with `auto_fallback = "error"`.
    pub fn route(
        &self,
        query: &str,
        classification: &Classification,
        options: &RouteOptions,
    ) -> RouteResult<RoutingDecision> {
        let complexity = classify(query);
        let query_type = classify_query_type(query);

        // Cache hits short-circuit every other stage: the response never
        // leaves the machine.
        if let Some(hit) = &options.cache_hit {
            let decision = RoutingDecision {
                tier: Tier::Cache,
                complexity,
                query_type,
                reason: format!(
                    "Served from cache (similarity {:.2}) at zero cost.",
                    hit.similarity
                ),
                estimated_cost_cents: 0.0,
                enforcement_applied: false,
                auto_options: None,
            };
            self.audit_decision(query, &decision);
            return Ok(decision);
        }

        let mode = options
            .mode
            .clone()
            .unwrap_or_else(|| self.config.routing.default_mode.clone());
        let paranoid = options.paranoid || self.config.routing.paranoid;
        let offline = options.offline || self.config.routing.offline;
        let tokens = options
            .estimated_tokens
            .unwrap_or_else(|| estimate_tokens(query));

        let mut tier = complexity.min_tier();
        let mut reason_parts: Vec<String> =
            vec![format!("Query classified as {complexity}")];

        // Stage 2: mode.
        let cloud_demanded = mode == "cloud";
        match mode.as_str() {
            "local" => {
                if tier > Tier::Local {
                    tier = Tier::Local;
                    reason_parts.push("clamped to local by mode".to_owned());
                }
            },
            "cloud" => {
                if tier < Tier::Cloud {
                    tier = Tier::Cloud;
                    reason_parts.push("escalated to cloud by mode".to_owned());
                }
            },
            // auto and the migrated hybrid alias use the minimum tier.
            _ => {},
        }

        // Stage 3: paranoid.
        if paranoid && tier.is_cloud() {
            if cloud_demanded {
                return Err(RouteError::ParanoidModeBlocked { requested: tier });
            }
            tier = Tier::Local;
            reason_parts.push("paranoid mode forces local".to_owned());
        }

        // Stage 4: offline.
        if offline && tier.is_cloud() {
            if cloud_demanded {
                return Err(RouteError::OfflineModeBlocked { requested: tier });
            }
            tier = Tier::Local;
            reason_parts.push("offline mode forces local".to_owned());
        }

        // Stage 5: max-tier cap.
        let cap = self.config.routing.max_tier;
        if tier > cap {
            if cloud_demanded && cap < Tier::Cloud {
                return Err(RouteError::NoEligibleTier);
            }
            tier = cap;
            reason_parts.push(format!("capped at {cap} by max_tier"));
        }

        // Stage 6: classification enforcement.
        let mut enforcement_applied = false;
        if classification.level.requires_local_only() {
            if cloud_demanded {
                let requested = if tier.is_cloud() { tier } else { Tier::Cloud };
                return Err(RouteError::ClassificationBlocked {
                    level: classification.level,
                    requested,
                });
            }
            let (enforced, rewritten) = self.enforcer.enforce_routing(classification.level, tier);
            if rewritten {
                reason_parts.push(format!(
                    "classification {} enforces local-only",
                    classification.level
                ));
                enforcement_applied = true;
            }
            tier = enforced;
        }

        // Stage 7: cost cap (auto mode only).
        let cap_cents = self.config.routing.auto_max_cost;
        let mut cost = estimate_cost_cents(tier, tokens);
        if mode == "auto" && cap_cents > 0.0 && cost > cap_cents {
            let fallback = self
                .config
                .routing
                .auto_fallback
                .as_deref()
                .unwrap_or("local");
            self.emitter.emit(
                AuditEvent::new(AuditKind::CostCapExceeded, self.session_id.clone())
                    .with_tier(tier)
                    .with_cost(cost)
                    .with_metadata("cap_cents", format!("{cap_cents:.2}"))
                    .failed(),
            );
            if fallback == "error" {
                return Err(RouteError::CostCapExceeded {
                    estimated_cents: cost,
                    cap_cents,
                });
            }
            tier = Tier::Local;
            cost = 0.0;
            reason_parts.push(format!(
                "estimated cost exceeded the {cap_cents:.0}¢ cap, de-escalated to local"
            ));
        }

        let auto_options = (mode == "auto").then(|| auto_options_for(tier, tokens));

        let decision = RoutingDecision {
            tier,
            complexity,
            query_type,
            reason: format!("{}.", reason_parts.join("; ")),
            estimated_cost_cents: cost,
            enforcement_applied,
            auto_options,
        };
        self.audit_decision(query, &decision);
        Ok(decision)
    }

    fn audit_decision(&self, query: &str, decision: &RoutingDecision) {
        debug!(
            tier = %decision.tier,
            complexity = %decision.complexity,
            "routing decision"
        );
        self.emitter.emit(
            AuditEvent::new(AuditKind::RoutingDecision, self.session_id.clone())
                .with_tier(decision.tier)
                .with_query(truncate(query, 256))
                .with_cost(decision.estimated_cost_cents)
                .with_metadata("complexity", decision.complexity.as_str())
                .with_metadata("reason", decision.reason.clone()),
        );
    }
}

/// Rough token estimate: one token per four characters of query, plus a
/// flat response overhead.
fn estimate_tokens(query: &str) -> u64 {
    (query.len() as u64)
        .saturating_div(4)
        .saturating_add(RESPONSE_TOKEN_OVERHEAD)
}

/// Cost of `tokens` at `tier`, in cents.
fn estimate_cost_cents(tier: Tier, tokens: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let thousands = tokens as f64 / 1000.0;
    thousands * tier.cost_per_1k_cents()
}

/// The escalation alternatives offered in auto mode.
fn auto_options_for(chosen: Tier, tokens: u64) -> Vec<AutoOption> {
    let mut options = Vec::new();
    let mut tier = chosen;
    while let Some(next) = tier.escalate() {
        options.push(AutoOption {
            tier: next,
            estimated_cost_cents: estimate_cost_cents(next, tokens),
        });
        tier = next;
    }
    options
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        format!("{}…", &s[..end])
    }
}
