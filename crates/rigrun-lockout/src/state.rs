//! Persisted lockout state.
//!
//! On disk: the JSON body `{attempts, saved_at, version}` followed by the
//! 32-byte HMAC-SHA256 tag (the crypto crate's seal layout), written
//! atomically at mode 0600.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk format version.
pub const STATE_VERSION: &str = "1.0";

/// Per-identifier attempt history.
///
/// Invariant: `locked` holds iff `count >= max_attempts` and the lock has
/// not expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Consecutive failed attempts since the last success or lock expiry.
    pub count: u32,
    /// First failed attempt in the current run.
    pub first_attempt: DateTime<Utc>,
    /// Most recent attempt of either kind.
    pub last_attempt: DateTime<Utc>,
    /// Whether the identifier is currently locked.
    pub locked: bool,
    /// When the lock expires, if locked.
    pub locked_until: Option<DateTime<Utc>>,
    /// How many times this identifier has been locked out in total.
    pub lockout_count: u32,
}

impl AttemptRecord {
    /// A fresh record dated `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            first_attempt: now,
            last_attempt: now,
            locked: false,
            locked_until: None,
            lockout_count: 0,
        }
    }

    /// Whether the lock is active at `now`.
    #[must_use]
    pub fn locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked && self.locked_until.is_some_and(|until| now < until)
    }
}

/// The serialized state file body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutState {
    /// Identifier → attempt record.
    pub attempts: HashMap<String, AttemptRecord>,
    /// When this state was written.
    pub saved_at: DateTime<Utc>,
    /// Format version, always [`STATE_VERSION`].
    pub version: String,
}

impl LockoutState {
    /// Wrap an attempt map for persistence.
    #[must_use]
    pub fn new(attempts: HashMap<String, AttemptRecord>) -> Self {
        Self {
            attempts,
            saved_at: Utc::now(),
            version: STATE_VERSION.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_record_is_unlocked() {
        let now = Utc::now();
        let record = AttemptRecord::new(now);
        assert_eq!(record.count, 0);
        assert!(!record.locked_at(now));
    }

    #[test]
    fn test_locked_at_respects_expiry() {
        let now = Utc::now();
        let mut record = AttemptRecord::new(now);
        record.locked = true;
        record.locked_until = now.checked_add_signed(Duration::minutes(15));

        assert!(record.locked_at(now));
        let later = now.checked_add_signed(Duration::minutes(16)).unwrap();
        assert!(!record.locked_at(later));
    }

    #[test]
    fn test_state_roundtrip() {
        let mut attempts = HashMap::new();
        attempts.insert("hash:abc".to_owned(), AttemptRecord::new(Utc::now()));
        let state = LockoutState::new(attempts);

        let json = serde_json::to_string(&state).unwrap();
        let back: LockoutState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, STATE_VERSION);
        assert_eq!(back.attempts.len(), 1);
    }
}
