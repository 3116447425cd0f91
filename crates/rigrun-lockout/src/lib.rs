//! Rigrun Lockout - Persistent authentication-failure state with
//! paranoid mode.
//!
//! The manager keeps a per-identifier attempt counter, persists it as
//! HMAC-sealed JSON written atomically, and re-verifies the on-disk state
//! before **every** operation. Tampering (editing, truncating, or
//! deleting the state file) flips the manager into paranoid mode, in
//! which operations are refused until an operator explicitly clears it
//! with an audited reason.
//!
//! Identifiers never appear verbatim in audit output; they are masked as
//! `hash:` plus twelve hex characters of their SHA-256.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod manager;
mod state;

pub use error::{LockoutError, LockoutResult};
pub use manager::{LockoutManager, global_manager};
pub use state::{AttemptRecord, LockoutState, STATE_VERSION};
