//! Rigrun Crypto - Tamper evidence for persisted state.
//!
//! This crate provides:
//! - 32-byte state keys generated from the OS CSPRNG ([`StateKey`])
//! - The `payload‖HMAC-SHA256` seal/open codec ([`StateCodec`])
//! - Identifier masking for audit output ([`mask_identifier`])
//!
//! # Security Model
//!
//! State files on disk are wrapped with an HMAC-SHA256 tag keyed by a
//! random key stored alongside the data at mode 0600. Any edit to either
//! file breaks verification; the owning component reacts by entering
//! paranoid mode. Key generation failure is fatal for the subsystem:
//! there is **no** deterministic fallback key.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod codec;
mod error;
mod key;
mod mask;

pub use codec::{StateCodec, TAG_LEN};
pub use error::{CryptoError, CryptoResult};
pub use key::StateKey;
pub use mask::mask_identifier;
