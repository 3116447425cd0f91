//! The lockout manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use chrono::{DateTime, Duration, Utc};
use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_core::SessionId;
use rigrun_crypto::{StateCodec, StateKey, mask_identifier};
use tracing::{info, warn};

use crate::error::{LockoutError, LockoutResult};
use crate::state::{AttemptRecord, LockoutState};

/// Default failed attempts before lockout.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default lockout duration in minutes.
const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

struct Inner {
    attempts: HashMap<String, AttemptRecord>,
    max_attempts: u32,
    lockout_duration: Duration,
    paranoid: bool,
    /// Whether state has ever been persisted (or loaded) successfully.
    /// Once true, a missing state file is evidence of tampering.
    persisted: bool,
}

/// Tracks authentication failures per identifier with sealed persistence.
///
/// The on-disk state is integrity-verified before **every** operation,
/// not only on load; reads trigger enforcement too.
pub struct LockoutManager {
    inner: RwLock<Inner>,
    /// `None` when key material is unavailable; the manager then stays in
    /// paranoid mode and refuses operations. No fallback key exists.
    codec: Option<StateCodec>,
    state_path: PathBuf,
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
}

impl LockoutManager {
    /// Open (or initialize) the manager over its state and key files.
    ///
    /// Key-material failure or a tampered existing state does not fail
    /// construction; the manager starts in paranoid mode instead and
    /// refuses operations until cleared.
    #[must_use]
    pub fn open(
        state_path: impl Into<PathBuf>,
        key_path: impl AsRef<Path>,
        emitter: Arc<AuditEmitter>,
    ) -> Self {
        let state_path = state_path.into();
        let session_id = SessionId::new();

        let codec = match StateKey::load_or_generate(key_path.as_ref()) {
            Ok(key) => Some(StateCodec::new(key)),
            Err(e) => {
                warn!(error = %e, "lockout state key unavailable; entering paranoid mode");
                None
            },
        };

        let paranoid = codec.is_none();
        let this = Self {
            inner: RwLock::new(Inner {
                attempts: HashMap::new(),
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                lockout_duration: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
                paranoid,
                persisted: false,
            }),
            codec,
            state_path,
            emitter,
            session_id,
        };
        // Load any existing state; a corrupt file flips paranoid mode.
        this.initial_load();
        this
    }

    fn initial_load(&self) {
        let Some(codec) = &self.codec else {
            self.audit_paranoid_set("state key unavailable");
            return;
        };
        if !self.state_path.exists() {
            return;
        }

        let loaded = std::fs::read(&self.state_path)
            .map_err(|e| e.to_string())
            .and_then(|blob| {
                codec
                    .open(&blob)
                    .map_err(|e| e.to_string())
                    .and_then(|payload| {
                        serde_json::from_slice::<LockoutState>(payload).map_err(|e| e.to_string())
                    })
            });

        if let Ok(mut inner) = self.inner.write() {
            match loaded {
                Ok(state) => {
                    info!(
                        identifiers = state.attempts.len(),
                        "lockout state loaded"
                    );
                    inner.attempts = state.attempts;
                    inner.persisted = true;
                },
                Err(e) => {
                    drop(inner);
                    self.enter_paranoid(&format!("state load failed: {e}"));
                },
            }
        }
    }

    /// Record one authentication attempt for `id`.
    ///
    /// The on-disk state is verified first; tampering flips paranoid mode
    /// before the attempt is considered.
    ///
    /// # Errors
    ///
    /// - [`LockoutError::ParanoidMode`] while paranoid mode is active
    /// - [`LockoutError::Locked`] when the identifier is locked (including
    ///   the call that crosses the threshold, and always under an
    ///   instant-lockout policy of `max_attempts == 0`)
    pub fn record_attempt(&self, id: &str, success: bool) -> LockoutResult<()> {
        self.verify_integrity();

        let now = Utc::now();
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LockoutError::Integrity("manager lock poisoned".to_owned()))?;

        let paranoid = inner.paranoid;
        let max_attempts = inner.max_attempts;
        let lockout_duration = inner.lockout_duration;

        if paranoid && max_attempts == 0 {
            self.emitter.emit(
                AuditEvent::new(AuditKind::AuthBlockedParanoid, self.session_id.clone())
                    .with_metadata("identifier", mask_identifier(id))
                    .failed(),
            );
            return Err(LockoutError::ParanoidMode);
        }

        if max_attempts == 0 {
            return Err(LockoutError::Locked { until: None });
        }

        let record = inner
            .attempts
            .entry(id.to_owned())
            .or_insert_with(|| AttemptRecord::new(now));

        if record.locked_at(now) {
            return Err(LockoutError::Locked {
                until: record.locked_until,
            });
        }

        if paranoid && record.count >= 1 {
            return Err(LockoutError::ParanoidMode);
        }

        // Expired lock: clear it along with the counter.
        if record.locked {
            record.locked = false;
            record.locked_until = None;
            record.count = 0;
        }

        record.last_attempt = now;

        if success {
            record.count = 0;
            self.save(&mut inner)?;
            return Ok(());
        }

        record.count = record.count.saturating_add(1);
        if record.count == 1 {
            record.first_attempt = now;
        }

        if record.count >= max_attempts {
            record.locked = true;
            let until = now
                .checked_add_signed(lockout_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.locked_until = Some(until);
            record.lockout_count = record.lockout_count.saturating_add(1);
            let lockout_count = record.lockout_count;

            warn!(
                identifier = %mask_identifier(id),
                lockout_count,
                "identifier locked out"
            );
            self.emitter.emit(
                AuditEvent::new(AuditKind::AuthLockout, self.session_id.clone())
                    .with_metadata("identifier", mask_identifier(id))
                    .with_metadata("lockout_count", lockout_count.to_string())
                    .with_metadata("locked_until", until.to_rfc3339())
                    .failed(),
            );
            self.save(&mut inner)?;
            return Err(LockoutError::Locked { until: Some(until) });
        }

        self.save(&mut inner)?;
        Ok(())
    }

    /// Whether `id` is currently locked.
    ///
    /// Applies the same paranoid-mode checks as [`Self::record_attempt`],
    /// so reads trigger enforcement too.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError::ParanoidMode`] while paranoid mode blocks
    /// the identifier.
    pub fn is_locked(&self, id: &str) -> LockoutResult<bool> {
        self.verify_integrity();

        let now = Utc::now();
        let inner = self
            .inner
            .read()
            .map_err(|_| LockoutError::Integrity("manager lock poisoned".to_owned()))?;

        if inner.paranoid && inner.max_attempts == 0 {
            self.emitter.emit(
                AuditEvent::new(AuditKind::AuthBlockedParanoid, self.session_id.clone())
                    .with_metadata("identifier", mask_identifier(id))
                    .failed(),
            );
            return Err(LockoutError::ParanoidMode);
        }

        let record = inner.attempts.get(id);

        if inner.paranoid && record.is_some_and(|r| r.count >= 1) {
            return Err(LockoutError::ParanoidMode);
        }

        Ok(record.is_some_and(|r| r.locked_at(now)))
    }

    /// Whether paranoid mode is active.
    #[must_use]
    pub fn is_paranoid(&self) -> bool {
        self.inner.read().map(|i| i.paranoid).unwrap_or(true)
    }

    /// Explicitly leave paranoid mode. The reason is audited.
    pub fn clear_paranoid_mode(&self, reason: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.paranoid = false;
        }
        info!(reason, "paranoid mode cleared by operator");
        self.emitter.emit(
            AuditEvent::new(AuditKind::ParanoidModeCleared, self.session_id.clone())
                .with_metadata("reason", reason),
        );
    }

    /// Snapshot of the attempt record for `id`.
    #[must_use]
    pub fn attempt_record(&self, id: &str) -> Option<AttemptRecord> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.attempts.get(id).cloned())
    }

    /// Configured attempt threshold.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.inner
            .read()
            .map(|i| i.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Set the attempt threshold. Zero means instant lockout.
    pub fn set_max_attempts(&self, max_attempts: u32) {
        if let Ok(mut inner) = self.inner.write() {
            inner.max_attempts = max_attempts;
        }
    }

    /// Configured lockout duration.
    #[must_use]
    pub fn lockout_duration(&self) -> Duration {
        self.inner
            .read()
            .map(|i| i.lockout_duration)
            .unwrap_or_else(|_| Duration::minutes(DEFAULT_LOCKOUT_MINUTES))
    }

    /// Set the lockout duration.
    pub fn set_lockout_duration(&self, duration: Duration) {
        if let Ok(mut inner) = self.inner.write() {
            inner.lockout_duration = duration;
        }
    }

    /// Verify the on-disk state; tampering flips paranoid mode.
    fn verify_integrity(&self) {
        let Some(codec) = &self.codec else {
            self.enter_paranoid("state key unavailable");
            return;
        };

        let persisted = self.inner.read().map(|i| i.persisted).unwrap_or(false);

        if !self.state_path.exists() {
            if persisted {
                self.enter_paranoid("state file deleted");
            }
            return;
        }

        let verified = std::fs::read(&self.state_path)
            .map_err(|e| e.to_string())
            .and_then(|blob| codec.open(&blob).map(|_| ()).map_err(|e| e.to_string()));

        if let Err(e) = verified {
            self.enter_paranoid(&format!("state verification failed: {e}"));
        }
    }

    fn enter_paranoid(&self, reason: &str) {
        let newly = self
            .inner
            .write()
            .map(|mut inner| {
                let newly = !inner.paranoid;
                inner.paranoid = true;
                newly
            })
            .unwrap_or(false);
        if newly {
            warn!(reason, "lockout manager entering paranoid mode");
            self.audit_paranoid_set(reason);
        }
    }

    fn audit_paranoid_set(&self, reason: &str) {
        self.emitter.emit(
            AuditEvent::new(AuditKind::ParanoidModeSet, self.session_id.clone())
                .with_metadata("reason", reason)
                .failed(),
        );
    }

    fn save(&self, inner: &mut Inner) -> LockoutResult<()> {
        let codec = self
            .codec
            .as_ref()
            .ok_or(LockoutError::ParanoidMode)?;

        let state = LockoutState::new(inner.attempts.clone());
        let payload = serde_json::to_vec(&state)?;
        let blob = codec.seal(&payload);
        rigrun_core::atomic::write(&self.state_path, &blob, 0o600)?;
        inner.persisted = true;
        Ok(())
    }
}

static GLOBAL: OnceLock<Arc<LockoutManager>> = OnceLock::new();

/// The process-wide lockout manager over the rigrun home paths.
///
/// Falls back to paranoid-mode paths under `.` if the home cannot be
/// resolved; that state refuses operations, which is the safe default.
pub fn global_manager() -> Arc<LockoutManager> {
    Arc::clone(GLOBAL.get_or_init(|| {
        let (state, key) = match rigrun_core::RigrunHome::resolve() {
            Ok(home) => {
                let _ = home.ensure();
                (home.lockout_state_path(), home.lockout_key_path())
            },
            Err(_) => (
                PathBuf::from("lockout_state.json"),
                PathBuf::from("lockout_state.json.key"),
            ),
        };
        Arc::new(LockoutManager::open(state, key, rigrun_audit::global()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigrun_audit::MemorySink;

    struct Fixture {
        _dir: tempfile::TempDir,
        sink: Arc<MemorySink>,
        state_path: PathBuf,
        key_path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let state_path = dir.path().join("lockout_state.json");
            let key_path = dir.path().join("lockout_state.json.key");
            Self {
                _dir: dir,
                sink: Arc::new(MemorySink::new()),
                state_path,
                key_path,
            }
        }

        fn manager(&self) -> LockoutManager {
            LockoutManager::open(
                &self.state_path,
                &self.key_path,
                Arc::new(AuditEmitter::new(self.sink.clone())),
            )
        }
    }

    #[test]
    fn test_threshold_locks_and_stays_locked() {
        let fx = Fixture::new();
        let manager = fx.manager();

        assert!(manager.record_attempt("u", false).is_ok());
        assert!(manager.record_attempt("u", false).is_ok());
        // Third failure crosses the default threshold of 3.
        assert!(matches!(
            manager.record_attempt("u", false),
            Err(LockoutError::Locked { until: Some(_) })
        ));
        // Fourth attempt is refused outright.
        assert!(matches!(
            manager.record_attempt("u", false),
            Err(LockoutError::Locked { .. })
        ));
        assert!(manager.is_locked("u").unwrap());
        assert!(
            fx.sink
                .events()
                .iter()
                .any(|e| e.event_type == AuditKind::AuthLockout)
        );
    }

    #[test]
    fn test_success_resets_counter() {
        let fx = Fixture::new();
        let manager = fx.manager();

        manager.record_attempt("u", false).unwrap();
        manager.record_attempt("u", false).unwrap();
        manager.record_attempt("u", true).unwrap();
        assert_eq!(manager.attempt_record("u").unwrap().count, 0);

        // The counter starts over; two more failures do not lock.
        manager.record_attempt("u", false).unwrap();
        manager.record_attempt("u", false).unwrap();
        assert!(!manager.is_locked("u").unwrap());
    }

    #[test]
    fn test_expired_lock_clears() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.set_lockout_duration(Duration::milliseconds(20));

        for _ in 0..2 {
            manager.record_attempt("u", false).unwrap();
        }
        assert!(manager.record_attempt("u", false).is_err());
        assert!(manager.is_locked("u").unwrap());

        std::thread::sleep(std::time::Duration::from_millis(40));
        assert!(!manager.is_locked("u").unwrap());
        // Next attempt clears the stale lock and records afresh.
        manager.record_attempt("u", false).unwrap();
        assert_eq!(manager.attempt_record("u").unwrap().count, 1);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let fx = Fixture::new();
        let manager = fx.manager();

        for _ in 0..2 {
            manager.record_attempt("alice", false).unwrap();
        }
        assert!(manager.record_attempt("alice", false).is_err());
        assert!(!manager.is_locked("bob").unwrap());
    }

    #[test]
    fn test_instant_lockout_policy() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.set_max_attempts(0);

        assert!(matches!(
            manager.record_attempt("u", false),
            Err(LockoutError::Locked { until: None })
        ));
        assert!(matches!(
            manager.record_attempt("u", true),
            Err(LockoutError::Locked { until: None })
        ));
    }

    #[test]
    fn test_state_reload_roundtrip() {
        let fx = Fixture::new();
        {
            let manager = fx.manager();
            manager.record_attempt("u", false).unwrap();
            manager.record_attempt("u", false).unwrap();
        }

        let reopened = fx.manager();
        assert!(!reopened.is_paranoid());
        assert_eq!(reopened.attempt_record("u").unwrap().count, 2);
    }

    #[test]
    fn test_edited_state_file_triggers_paranoid() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.record_attempt("u", false).unwrap();

        let mut blob = std::fs::read(&fx.state_path).unwrap();
        blob[0] ^= 0x01;
        std::fs::write(&fx.state_path, &blob).unwrap();

        // Verification runs before the attempt is considered.
        let _ = manager.record_attempt("u", false);
        assert!(manager.is_paranoid());
        assert!(
            fx.sink
                .events()
                .iter()
                .any(|e| e.event_type == AuditKind::ParanoidModeSet)
        );

        // With a prior failure on record, paranoid mode refuses access.
        assert!(matches!(
            manager.record_attempt("u", false),
            Err(LockoutError::ParanoidMode)
        ));
        assert!(matches!(
            manager.is_locked("u"),
            Err(LockoutError::ParanoidMode)
        ));
    }

    #[test]
    fn test_deleted_state_file_triggers_paranoid() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.record_attempt("u", false).unwrap();

        std::fs::remove_file(&fx.state_path).unwrap();
        let _ = manager.is_locked("u");
        assert!(manager.is_paranoid());
    }

    #[test]
    fn test_paranoid_persists_until_cleared() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.record_attempt("u", false).unwrap();

        std::fs::remove_file(&fx.state_path).unwrap();
        let _ = manager.is_locked("u");
        assert!(manager.is_paranoid());

        manager.clear_paranoid_mode("operator verified host integrity");
        assert!(!manager.is_paranoid());
        assert!(fx.sink.events().iter().any(|e| {
            e.event_type == AuditKind::ParanoidModeCleared
                && e.metadata["reason"].contains("operator")
        }));
    }

    #[test]
    fn test_paranoid_instant_lockout_emits_blocked_event() {
        let fx = Fixture::new();
        let manager = fx.manager();
        manager.record_attempt("u", false).unwrap();

        std::fs::remove_file(&fx.state_path).unwrap();
        let _ = manager.is_locked("u");
        manager.set_max_attempts(0);

        assert!(matches!(
            manager.record_attempt("u", false),
            Err(LockoutError::ParanoidMode)
        ));
        assert!(
            fx.sink
                .events()
                .iter()
                .any(|e| e.event_type == AuditKind::AuthBlockedParanoid)
        );
    }

    #[test]
    fn test_audit_output_masks_identifiers() {
        let fx = Fixture::new();
        let manager = fx.manager();

        let id = "admin@example.mil";
        for _ in 0..2 {
            manager.record_attempt(id, false).unwrap();
        }
        let _ = manager.record_attempt(id, false);

        for line in fx.sink.lines() {
            assert!(!line.contains(id), "raw identifier leaked: {line}");
        }
        let lockout = fx
            .sink
            .events()
            .into_iter()
            .find(|e| e.event_type == AuditKind::AuthLockout)
            .unwrap();
        assert!(lockout.metadata["identifier"].starts_with("hash:"));
    }

    #[test]
    fn test_setters_roundtrip() {
        let fx = Fixture::new();
        let manager = fx.manager();

        manager.set_max_attempts(5);
        assert_eq!(manager.max_attempts(), 5);
        manager.set_lockout_duration(Duration::minutes(30));
        assert_eq!(manager.lockout_duration(), Duration::minutes(30));
    }

    #[test]
    fn test_missing_key_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("lockout_state.json");
        let key = dir.path().join("deep").join("lockout_state.json.key");
        let manager = LockoutManager::open(
            &nested,
            &key,
            Arc::new(AuditEmitter::new(Arc::new(MemorySink::new()))),
        );
        assert!(!manager.is_paranoid());
        manager.record_attempt("u", false).unwrap();
    }
}
