use sha2::{Digest, Sha256};

const FINGERPRINT_LEN: usize = 12;

/// Short, non-reversible identifier of a secret value (like a bearer
/// token) that is safe to record in logs.
#[must_use]
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

#[cfg(test)]
mod tests {
    use super::fingerprint;

    #[test]
    fn is_short_and_stable() {
        let a = fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.signature");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.signature"));
        assert_ne!(a, fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.signaturf"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
