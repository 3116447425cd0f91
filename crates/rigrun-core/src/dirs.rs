//! Directory scaffolding for the rigrun home directory.
//!
//! All persistent state lives under `~/.rigrun/` (or `$RIGRUN_HOME`):
//!
//! ```text
//! ~/.rigrun/
//! ├── config.toml                 (preferred config format, 0600)
//! ├── config.json                 (fallback config format, 0600)
//! ├── lockout_state.json          (sealed lockout state, 0600)
//! ├── lockout_state.json.key      (32-byte HMAC key, 0600)
//! ├── network_policy.json         (egress policy, 0600)
//! ├── network_policy.json.sig     (hex HMAC over policy bytes, 0600)
//! ├── audit.log                   (newline-delimited JSON events)
//! └── audit-fallback.log          (pre-init audit events)
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// The rigrun home directory (`~/.rigrun/` or `$RIGRUN_HOME`).
#[derive(Debug, Clone)]
pub struct RigrunHome {
    root: PathBuf,
}

impl RigrunHome {
    /// Resolve the home directory.
    ///
    /// Checks `$RIGRUN_HOME` first, then falls back to `$HOME/.rigrun/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `$RIGRUN_HOME` is relative, or neither
    /// `$RIGRUN_HOME` nor `$HOME` is set.
    pub fn resolve() -> io::Result<Self> {
        let root = if let Ok(custom) = std::env::var("RIGRUN_HOME") {
            let p = PathBuf::from(&custom);
            if !p.is_absolute() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "RIGRUN_HOME must be an absolute path",
                ));
            }
            p
        } else {
            let home = std::env::var("HOME").map_err(|_| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "neither RIGRUN_HOME nor HOME environment variable is set",
                )
            })?;
            PathBuf::from(home).join(".rigrun")
        };

        Ok(Self { root })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the directory exists with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or permission setting fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.root, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the TOML configuration file (preferred format).
    #[must_use]
    pub fn config_toml_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the JSON configuration file (fallback format).
    #[must_use]
    pub fn config_json_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to the sealed lockout state file.
    #[must_use]
    pub fn lockout_state_path(&self) -> PathBuf {
        self.root.join("lockout_state.json")
    }

    /// Path to the lockout HMAC key file.
    #[must_use]
    pub fn lockout_key_path(&self) -> PathBuf {
        self.root.join("lockout_state.json.key")
    }

    /// Path to the network policy file.
    #[must_use]
    pub fn network_policy_path(&self) -> PathBuf {
        self.root.join("network_policy.json")
    }

    /// Path to the network policy signature file.
    #[must_use]
    pub fn network_policy_sig_path(&self) -> PathBuf {
        self.root.join("network_policy.json.sig")
    }

    /// Path to the audit log (newline-delimited JSON).
    #[must_use]
    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join("audit.log")
    }

    /// Path to the pre-init audit fallback log.
    #[must_use]
    pub fn audit_fallback_path(&self) -> PathBuf {
        self.root.join("audit-fallback.log")
    }
}
