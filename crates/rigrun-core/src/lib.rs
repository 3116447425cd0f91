//! Rigrun Core - Shared domain types for the rigrun security core.
//!
//! This crate provides:
//! - Routing tiers and their total order ([`Tier`])
//! - DoD-style classification levels and markings ([`Classification`])
//! - Session identifiers ([`SessionId`])
//! - The `~/.rigrun/` directory layout ([`RigrunHome`])
//! - Crash-safe atomic file writes ([`atomic::write`])
//!
//! Everything here is dependency-light and consumed by every other
//! rigrun crate.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod atomic;
pub mod prelude;

mod classification;
mod dirs;
mod error;
mod session;
mod tier;

pub use classification::{Classification, ClassificationLevel};
pub use dirs::RigrunHome;
pub use error::{CoreError, CoreResult};
pub use session::SessionId;
pub use tier::Tier;
