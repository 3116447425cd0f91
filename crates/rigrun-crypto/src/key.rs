//! State keys with secure generation and storage.

use std::io::{Read, Write};
use std::path::Path;

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

/// Length of a state key in bytes.
const KEY_LEN: usize = 32;

/// A 32-byte HMAC key for sealing persisted state.
///
/// Generated from the OS CSPRNG on first use and stored alongside the
/// data file at mode 0600. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct StateKey {
    bytes: [u8; KEY_LEN],
}

impl StateKey {
    /// Generate a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomSourceFailed`] if the OS CSPRNG cannot
    /// produce bytes. Callers must treat this as fatal for their subsystem;
    /// there is no deterministic fallback.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomSourceFailed(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Create from existing key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly
    /// 32 bytes.
    pub fn from_bytes(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(slice);
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Load an existing key from a file, or generate and save a new one.
    ///
    /// # Security
    ///
    /// - On Unix, uses `O_CREAT | O_EXCL` (atomic create) with mode 0o600
    ///   to prevent TOCTOU races and world-readable windows.
    /// - Refuses to read key files that are symlinks.
    /// - Read buffers are wrapped in `Zeroizing` so key material is cleared
    ///   from memory when no longer needed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] on I/O failures or symlink
    /// detection, [`CryptoError::InvalidKeyLength`] on a wrong-length file,
    /// or [`CryptoError::RandomSourceFailed`] if generation fails.
    pub fn load_or_generate(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::IoError(e.to_string()))?;
        }

        // Attempt atomic creation first.
        match open_exclusive(path) {
            Ok(mut file) => {
                let key = Self::generate()?;
                let write_result = file
                    .write_all(&key.bytes)
                    .and_then(|()| file.sync_all())
                    .map_err(|e| CryptoError::IoError(e.to_string()));
                if let Err(e) = write_result {
                    let _ = std::fs::remove_file(path);
                    return Err(e);
                }
                Ok(key)
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Self::read_key_file(path),
            Err(e) => Err(CryptoError::IoError(e.to_string())),
        }
    }

    fn read_key_file(path: &Path) -> CryptoResult<Self> {
        let meta =
            std::fs::symlink_metadata(path).map_err(|e| CryptoError::IoError(e.to_string()))?;
        if meta.file_type().is_symlink() {
            return Err(CryptoError::IoError(format!(
                "refusing to read key through symlink: {}",
                path.display()
            )));
        }

        let mut file = std::fs::File::open(path).map_err(|e| CryptoError::IoError(e.to_string()))?;
        let mut buf = Zeroizing::new(Vec::with_capacity(KEY_LEN));
        file.read_to_end(&mut buf)
            .map_err(|e| CryptoError::IoError(e.to_string()))?;

        Self::from_bytes(&buf)
    }
}

impl std::fmt::Debug for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateKey([REDACTED])")
    }
}

impl Clone for StateKey {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}
