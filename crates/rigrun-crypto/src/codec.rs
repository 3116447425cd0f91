//! The `payload‖HMAC-SHA256` seal/open codec.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};
use crate::key::StateKey;

type HmacSha256 = Hmac<Sha256>;

/// Length of the trailing HMAC-SHA256 tag in bytes.
pub const TAG_LEN: usize = 32;

/// Seals and opens persisted state blobs.
///
/// Layout on disk: `payload ‖ HMAC-SHA256(key, payload)`, with the tag
/// occupying the trailing 32 bytes.
pub struct StateCodec {
    key: StateKey,
}

impl StateCodec {
    /// Create a codec over the given key.
    #[must_use]
    pub fn new(key: StateKey) -> Self {
        Self { key }
    }

    /// Compute the tag over `payload`.
    fn tag(&self, payload: &[u8]) -> [u8; TAG_LEN] {
        #[allow(clippy::expect_used)]
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }

    /// Append the HMAC tag to `payload`.
    #[must_use]
    pub fn seal(&self, payload: &[u8]) -> Vec<u8> {
        let tag = self.tag(payload);
        let mut blob = Vec::with_capacity(payload.len().saturating_add(TAG_LEN));
        blob.extend_from_slice(payload);
        blob.extend_from_slice(&tag);
        blob
    }

    /// Verify a sealed blob and return the payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IntegrityCheckFailed`] if the blob is shorter
    /// than the tag or the tag does not match. Callers switch to paranoid
    /// mode on this error.
    pub fn open<'a>(&self, blob: &'a [u8]) -> CryptoResult<&'a [u8]> {
        if blob.len() < TAG_LEN {
            return Err(CryptoError::IntegrityCheckFailed(format!(
                "blob too short: {} bytes, need at least {TAG_LEN}",
                blob.len()
            )));
        }
        let split = blob.len().saturating_sub(TAG_LEN);
        let (payload, tag) = blob.split_at(split);
        let expected = self.tag(payload);
        if expected.ct_eq(tag).into() {
            Ok(payload)
        } else {
            Err(CryptoError::IntegrityCheckFailed(
                "HMAC tag mismatch".to_owned(),
            ))
        }
    }

    /// Compute the tag over `payload` and return it hex-encoded.
    ///
    /// Used for detached signatures (`.sig` files).
    #[must_use]
    pub fn sign_hex(&self, payload: &[u8]) -> String {
        hex::encode(self.tag(payload))
    }

    /// Verify a hex-encoded detached tag against `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IntegrityCheckFailed`] if the hex is
    /// malformed or the tag does not match.
    pub fn verify_hex(&self, payload: &[u8], sig_hex: &str) -> CryptoResult<()> {
        let sig = hex::decode(sig_hex.trim())
            .map_err(|e| CryptoError::IntegrityCheckFailed(format!("malformed signature: {e}")))?;
        let expected = self.tag(payload);
        if expected.ct_eq(&sig).into() {
            Ok(())
        } else {
            Err(CryptoError::IntegrityCheckFailed(
                "signature mismatch".to_owned(),
            ))
        }
    }
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateCodec([REDACTED])")
    }
}
