//! Cross-crate integration tests for the rigrun security core.
//!
//! The tests live in `tests/`; this crate exports nothing.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
