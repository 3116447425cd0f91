//! Error types for routing operations.

use rigrun_core::{ClassificationLevel, Tier};
use thiserror::Error;

/// Reasons a route request can be refused outright.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The classification level forbids the demanded tier.
    #[error("classification {level} cannot route to {requested}")]
    ClassificationBlocked {
        /// The session classification.
        level: ClassificationLevel,
        /// The tier that was demanded.
        requested: Tier,
    },

    /// Paranoid mode refuses every non-local tier.
    #[error("paranoid mode blocks {requested}")]
    ParanoidModeBlocked {
        /// The tier that was demanded.
        requested: Tier,
    },

    /// Offline mode permits only local-host endpoints.
    #[error("offline mode blocks {requested}")]
    OfflineModeBlocked {
        /// The tier that was demanded.
        requested: Tier,
    },

    /// The estimated cost exceeds the auto-mode cap.
    #[error("estimated cost {estimated_cents:.2}¢ exceeds cap {cap_cents:.2}¢")]
    CostCapExceeded {
        /// Estimated cost of the chosen tier.
        estimated_cents: f64,
        /// Configured cap.
        cap_cents: f64,
    },

    /// No tier satisfies every constraint simultaneously.
    #[error("no eligible tier under the current constraints")]
    NoEligibleTier,
}

/// Result type for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;
