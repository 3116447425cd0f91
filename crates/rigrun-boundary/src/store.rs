//! Signed policy persistence.
//!
//! The policy file is paired with a `.sig` file containing
//! `hex(HMAC-SHA256(policy_key, policy_bytes))`. The policy key comes from
//! the `POLICY_KEY` environment variable first, then the config field, and
//! must be at least 32 bytes. Key material of any length is reduced to the
//! codec's 32-byte key by SHA-256.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_core::SessionId;
use rigrun_crypto::{StateCodec, StateKey};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{BoundaryError, BoundaryResult};
use crate::policy::NetworkPolicy;

/// Minimum accepted policy key length in bytes.
const MIN_KEY_LEN: usize = 32;

/// Resolve the policy key: `POLICY_KEY` environment variable first, then
/// the config field.
///
/// # Errors
///
/// Returns [`BoundaryError::PolicyKeyNotConfigured`] if neither source is
/// set or the material is shorter than 32 bytes. Callers must keep the
/// built-in default-deny policy in that case.
pub fn resolve_policy_key(config_key: Option<&str>) -> BoundaryResult<StateKey> {
    let material = std::env::var("POLICY_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| config_key.map(str::to_owned))
        .ok_or_else(|| {
            BoundaryError::PolicyKeyNotConfigured(
                "neither POLICY_KEY nor security.policy_key is set".to_owned(),
            )
        })?;

    if material.len() < MIN_KEY_LEN {
        return Err(BoundaryError::PolicyKeyNotConfigured(format!(
            "policy key is {} bytes; minimum is {MIN_KEY_LEN}",
            material.len()
        )));
    }

    let digest = Sha256::digest(material.as_bytes());
    Ok(StateKey::from_bytes(digest.as_slice())?)
}

/// Loads and saves the signed network policy.
pub struct PolicyStore {
    policy_path: PathBuf,
    sig_path: PathBuf,
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
}

impl PolicyStore {
    /// Create a store over a policy file; the signature lives at
    /// `<policy>.sig`.
    #[must_use]
    pub fn new(policy_path: impl Into<PathBuf>, emitter: Arc<AuditEmitter>) -> Self {
        let policy_path = policy_path.into();
        let sig_path = sig_file_for(&policy_path);
        Self {
            policy_path,
            sig_path,
            emitter,
            session_id: SessionId::new(),
        }
    }

    /// Load and verify the policy.
    ///
    /// A missing or invalid signature is audited as
    /// `POLICY_TAMPER_DETECTED`; the caller keeps the built-in defaults.
    /// A persisted `default_allow = true` is overwritten to false and
    /// logged before the policy is returned.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::TamperDetected`] for signature failures,
    /// or I/O / parse errors for unreadable files.
    pub fn load(&self, key: &StateKey) -> BoundaryResult<NetworkPolicy> {
        let policy_bytes = std::fs::read(&self.policy_path)?;

        let sig_hex = match std::fs::read_to_string(&self.sig_path) {
            Ok(sig) => sig,
            Err(e) => {
                self.audit_tamper("signature file missing");
                return Err(BoundaryError::TamperDetected(format!(
                    "missing signature file {}: {e}",
                    self.sig_path.display()
                )));
            },
        };

        let codec = StateCodec::new(key.clone());
        if let Err(e) = codec.verify_hex(&policy_bytes, &sig_hex) {
            self.audit_tamper("signature mismatch");
            return Err(BoundaryError::TamperDetected(e.to_string()));
        }

        let mut policy: NetworkPolicy = serde_json::from_slice(&policy_bytes)?;
        if policy.normalize() {
            warn!("persisted policy carried default_allow=true; overwritten to false");
            self.emitter.emit(
                AuditEvent::new(AuditKind::PolicyLoaded, self.session_id.clone())
                    .with_metadata("default_allow_overwritten", "true"),
            );
        } else {
            self.emitter
                .emit(AuditEvent::new(AuditKind::PolicyLoaded, self.session_id.clone()));
        }

        info!(
            allowed_hosts = policy.allowed_hosts.len(),
            allowed_ports = policy.allowed_ports.len(),
            "network policy loaded"
        );
        Ok(policy)
    }

    /// Sign and persist the policy atomically, both files at mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an encoding or I/O error; on failure the previous files are
    /// left untouched.
    pub fn save(&self, policy: &NetworkPolicy, key: &StateKey) -> BoundaryResult<()> {
        let mut normalized = policy.clone();
        normalized.normalize();

        let policy_bytes = serde_json::to_vec_pretty(&normalized)?;
        let codec = StateCodec::new(key.clone());
        let sig_hex = codec.sign_hex(&policy_bytes);

        rigrun_core::atomic::write(&self.policy_path, &policy_bytes, 0o600)?;
        rigrun_core::atomic::write(&self.sig_path, sig_hex.as_bytes(), 0o600)?;

        self.emitter
            .emit(AuditEvent::new(AuditKind::PolicyUpdated, self.session_id.clone()));
        Ok(())
    }

    fn audit_tamper(&self, detail: &str) {
        warn!(detail, "network policy failed verification; keeping defaults");
        self.emitter.emit(
            AuditEvent::new(AuditKind::PolicyTamperDetected, self.session_id.clone())
                .with_metadata("detail", detail)
                .failed(),
        );
    }
}

fn sig_file_for(policy_path: &Path) -> PathBuf {
    let mut name = policy_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network_policy.json".to_owned());
    name.push_str(".sig");
    policy_path.with_file_name(name)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use rigrun_audit::MemorySink;
    use std::sync::Mutex;

    /// Serializes tests that mutate the `POLICY_KEY` env var.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn store(dir: &Path) -> (Arc<MemorySink>, PolicyStore) {
        let sink = Arc::new(MemorySink::new());
        let emitter = Arc::new(AuditEmitter::new(sink.clone()));
        (
            sink,
            PolicyStore::new(dir.join("network_policy.json"), emitter),
        )
    }

    fn test_key() -> StateKey {
        StateKey::from_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, store) = store(dir.path());
        let key = test_key();

        let policy = NetworkPolicy {
            allowed_hosts: vec!["*.example.com".to_owned()],
            ..Default::default()
        };
        store.save(&policy, &key).unwrap();

        let loaded = store.load(&key).unwrap();
        assert_eq!(loaded.allowed_hosts, vec!["*.example.com".to_owned()]);
    }

    #[test]
    fn test_flipped_policy_byte_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, store) = store(dir.path());
        let key = test_key();
        store.save(&NetworkPolicy::default(), &key).unwrap();

        let path = dir.path().join("network_policy.json");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.load(&key),
            Err(BoundaryError::TamperDetected(_))
        ));
        assert!(
            sink.events()
                .iter()
                .any(|e| e.event_type == AuditKind::PolicyTamperDetected)
        );
    }

    #[test]
    fn test_flipped_sig_byte_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, store) = store(dir.path());
        let key = test_key();
        store.save(&NetworkPolicy::default(), &key).unwrap();

        let sig_path = dir.path().join("network_policy.json.sig");
        let mut sig = std::fs::read_to_string(&sig_path).unwrap().into_bytes();
        // Flip a hex digit.
        sig[0] = if sig[0] == b'0' { b'1' } else { b'0' };
        std::fs::write(&sig_path, &sig).unwrap();

        assert!(matches!(
            store.load(&key),
            Err(BoundaryError::TamperDetected(_))
        ));
    }

    #[test]
    fn test_missing_sig_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, store) = store(dir.path());
        let key = test_key();
        store.save(&NetworkPolicy::default(), &key).unwrap();
        std::fs::remove_file(dir.path().join("network_policy.json.sig")).unwrap();

        assert!(matches!(
            store.load(&key),
            Err(BoundaryError::TamperDetected(_))
        ));
        assert!(
            sink.events()
                .iter()
                .any(|e| e.event_type == AuditKind::PolicyTamperDetected)
        );
    }

    #[test]
    fn test_wrong_key_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, store) = store(dir.path());
        store.save(&NetworkPolicy::default(), &test_key()).unwrap();

        let other = StateKey::from_bytes(&[9u8; 32]).unwrap();
        assert!(store.load(&other).is_err());
    }

    #[test]
    fn test_default_allow_true_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, store) = store(dir.path());
        let key = test_key();

        // Hand-craft a signed policy with default_allow=true.
        let json = serde_json::json!({
            "allowed_hosts": ["example.com"],
            "blocked_hosts": [],
            "allowed_ports": [443],
            "pinned_certificates": {},
            "updated_at": "2026-01-01T00:00:00Z",
            "default_allow": true
        });
        let bytes = serde_json::to_vec(&json).unwrap();
        let codec = StateCodec::new(key.clone());
        std::fs::write(dir.path().join("network_policy.json"), &bytes).unwrap();
        std::fs::write(
            dir.path().join("network_policy.json.sig"),
            codec.sign_hex(&bytes),
        )
        .unwrap();

        let loaded = store.load(&key).unwrap();
        assert!(!loaded.default_allow_was_set());
    }

    #[test]
    fn test_resolve_key_env_precedence() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: serialized by ENV_MUTEX
        unsafe { std::env::set_var("POLICY_KEY", "e".repeat(32)) };
        let from_env = resolve_policy_key(Some(&"c".repeat(32))).unwrap();
        unsafe { std::env::remove_var("POLICY_KEY") };
        let from_config = resolve_policy_key(Some(&"c".repeat(32))).unwrap();
        assert_ne!(from_env.as_bytes(), from_config.as_bytes());
    }

    #[test]
    fn test_resolve_key_unconfigured() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: serialized by ENV_MUTEX
        unsafe { std::env::remove_var("POLICY_KEY") };
        assert!(matches!(
            resolve_policy_key(None),
            Err(BoundaryError::PolicyKeyNotConfigured(_))
        ));
    }

    #[test]
    fn test_resolve_key_too_short() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: serialized by ENV_MUTEX
        unsafe { std::env::remove_var("POLICY_KEY") };
        assert!(matches!(
            resolve_policy_key(Some("short")),
            Err(BoundaryError::PolicyKeyNotConfigured(_))
        ));
    }
}
