//! Identifier masking for audit and log output.

use sha2::{Digest, Sha256};

/// Mask an identifier for audit output.
///
/// Returns `hash:` followed by the first 12 hex characters of
/// SHA-256 of the identifier. The mapping is unsalted; callers needing
/// cross-session correlation must maintain their own salted mapping.
#[must_use]
pub fn mask_identifier(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let hex = hex::encode(digest);
    format!("hash:{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_shape() {
        let masked = mask_identifier("alice");
        assert!(masked.starts_with("hash:"));
        assert_eq!(masked.len(), 17);
    }

    #[test]
    fn test_mask_deterministic() {
        assert_eq!(mask_identifier("alice"), mask_identifier("alice"));
        assert_ne!(mask_identifier("alice"), mask_identifier("bob"));
    }

    #[test]
    fn test_mask_never_contains_identifier() {
        let masked = mask_identifier("admin@example.mil");
        assert!(!masked.contains("admin"));
        assert!(!masked.contains("example"));
    }
}
