//! Rigrun Boundary - Default-deny egress filtering at the HTTP transport.
//!
//! This crate provides:
//! - The network policy and its host/port matching rules ([`NetworkPolicy`])
//! - Tamper-evident signed policy persistence ([`PolicyStore`])
//! - The boundary protector with its bounded decision log
//!   ([`BoundaryProtector`])
//! - The guarded HTTP client every outbound request must flow through
//!   ([`GuardedClient`], [`enforce_transport`])
//!
//! # Security Model
//!
//! `default_allow` is hard-wired false: a request is accepted only if its
//! host matches an allow entry, is not explicitly blocked, and its port is
//! allowed. The policy file is paired with a `.sig` file holding
//! `hex(HMAC-SHA256(policy_key, policy_bytes))`; a missing or invalid
//! signature keeps the built-in default-deny policy in force.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod policy;
mod protector;
mod store;
mod transport;

pub use error::{BoundaryError, BoundaryResult};
pub use policy::NetworkPolicy;
pub use protector::{BoundaryProtector, ConnectionDecision, global_protector};
pub use store::{PolicyStore, resolve_policy_key};
pub use transport::{GuardedClient, disable_enforcement, enforce_transport, http_client};
