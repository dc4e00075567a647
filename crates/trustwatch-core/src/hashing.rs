// crates/trustwatch-core/src/hashing.rs
// ============================================================================
// Module: Content Digests
// Description: SHA-256 digests used for change detection.
// Purpose: Give the crawl worker and the store a single, shared digest
//          function so "same content" means the same thing everywhere.
// Dependencies: sha2
// ============================================================================

//! SHA-256 digests used for change detection.

use sha2::Digest;
use sha2::Sha256;

/// Hex-encoded SHA-256 digest, as stored on `CrawlTarget.last_observed_digest`
/// and `ClaimVersion.content_digest`.
#[must_use]
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::sha256_hex;

    #[test]
    fn is_deterministic() {
        assert_eq!(sha256_hex("hello"), sha256_hex("hello"));
    }

    #[test]
    fn differs_on_content_change() {
        assert_ne!(sha256_hex("hello"), sha256_hex("hello!"));
    }

    #[test]
    fn matches_known_vector() {
        // sha256("") per FIPS 180-4 test vectors.
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
