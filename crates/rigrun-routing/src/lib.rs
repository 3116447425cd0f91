//! Rigrun Routing - Tiered query dispatch under compliance controls.
//!
//! This crate provides:
//! - A pure, deterministic complexity classifier ([`classify`])
//! - Classification-level enforcement ([`Enforcer`])
//! - The query router combining mode, paranoid/offline flags, tier caps,
//!   classification, and the cost cap into a [`RoutingDecision`]
//!
//! The classifier, enforcer, and router are pure with respect to their
//! inputs and never suspend; audit emission is the only side effect.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod complexity;
mod enforcer;
mod error;
mod router;

pub use complexity::{Complexity, QueryType, classify, classify_query_type};
pub use enforcer::Enforcer;
pub use error::{RouteError, RouteResult};
pub use router::{AutoOption, CacheHitResult, RouteOptions, Router, RoutingDecision};
