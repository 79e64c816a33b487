//! Content fingerprinting for fetched documents.

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a fetched document: sha256 over the
/// full byte stream, hex-encoded. Equality of fingerprints is the basis for
/// skip-reprocessing decisions.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stability() {
        let a = content_fingerprint(b"%PDF-1.7 content");
        let b = content_fingerprint(b"%PDF-1.7 content");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let a = content_fingerprint(b"%PDF-1.7 content");
        let b = content_fingerprint(b"%PDF-1.7 Content");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = content_fingerprint(b"");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
