use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Reset tokens stay valid for 10 minutes.
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(10);

/// Generates a fresh reset token: `(raw, hash)`. The raw value (32 random
/// bytes, hex-encoded) goes out of band to the user; only the hash is
/// persisted.
pub fn generate() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// One-way hash used both at creation and at lookup time.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub fn expiry() -> OffsetDateTime {
    OffsetDateTime::now_utc() + RESET_TOKEN_TTL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_token_is_256_bits_of_hex() {
        let (raw, _) = generate();
        assert_eq!(raw.len(), 64);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn stored_hash_matches_recomputed_hash() {
        let (raw, hash) = generate();
        assert_eq!(hash_token(&raw), hash);
        assert_ne!(raw, hash);
    }

    #[test]
    fn tokens_are_unique() {
        let (a, _) = generate();
        let (b, _) = generate();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_sha256() {
        // known vector: sha256("abc")
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let exp = expiry();
        let delta = exp - OffsetDateTime::now_utc();
        assert!(delta > Duration::minutes(9) && delta <= Duration::minutes(10));
    }
}
