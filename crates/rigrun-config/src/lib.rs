//! Rigrun Config - Configuration loading, validation, and the global handle.
//!
//! Configuration lives at `~/.rigrun/config.toml` (preferred) or
//! `~/.rigrun/config.json`, with environment variable overrides applied
//! last. Every section defaults to safe values, so an empty file produces
//! a working, local-only configuration.
//!
//! The loaded [`Config`] is immutable; mutation happens only through the
//! explicit [`global`] handle (`set` / `reload`).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod global;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use global::{get_global, reload_global, set_global};
pub use loader::{apply_env_overrides, collect_env_vars, load, save};
pub use types::{
    CacheSection, CloudSection, Config, LocalSection, RoutingSection, SecuritySection,
};
pub use validate::validate;
