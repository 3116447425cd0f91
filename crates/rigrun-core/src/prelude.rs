//! Prelude module - commonly used types for convenient import.
//!
//! Use `use rigrun_core::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use rigrun_core::prelude::*;
//!
//! let marking = Classification::parse("SECRET//NOFORN").unwrap();
//! assert!(marking.level.requires_local_only());
//! assert_eq!(marking.level.max_allowed_tier(), Tier::Local);
//! ```

// Errors
pub use crate::{CoreError, CoreResult};

// Domain types
pub use crate::{Classification, ClassificationLevel, SessionId, Tier};

// Directories
pub use crate::RigrunHome;
