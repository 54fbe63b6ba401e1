use oauth2::PkceCodeChallenge;
use rand::Rng;

/// Default verifier entropy in bytes.
///
/// 64 random bytes base64url-encode to an 86-character verifier, comfortably
/// inside the 43-128 character window RFC 7636 allows.
pub const DEFAULT_VERIFIER_BYTES: u32 = 64;

/// A PKCE verifier/challenge pair for one authorization attempt.
///
/// The challenge is base64url(SHA-256(verifier)) without padding. The pair is
/// single-use and never persisted server-side: the verifier round-trips
/// through the client and comes back at token-exchange time.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Random verifier, base64url-encoded without padding.
    pub verifier: String,
    /// SHA-256-derived challenge, base64url-encoded without padding.
    pub challenge: String,
}

impl PkcePair {
    /// Generate a pair with the default verifier entropy.
    pub fn generate() -> Self {
        Self::with_verifier_bytes(DEFAULT_VERIFIER_BYTES)
    }

    /// Generate a pair from `num_bytes` of random verifier entropy.
    ///
    /// `num_bytes` is clamped to the 32..=96 range the underlying generator
    /// accepts, which maps onto RFC 7636's 43-128 character verifier window.
    pub fn with_verifier_bytes(num_bytes: u32) -> Self {
        let (challenge, verifier) =
            PkceCodeChallenge::new_random_sha256_len(num_bytes.clamp(32, 96));
        Self {
            verifier: verifier.secret().to_string(),
            challenge: challenge.as_str().to_string(),
        }
    }
}

/// Generate a random hex state token for CSRF protection.
///
/// Independent of the PKCE pair; 16 random bytes rendered as 32 lowercase hex
/// characters.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 16] = rng.gen();
    random_bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use sha2::{Digest, Sha256};

    #[test]
    fn challenge_is_base64url_sha256_of_verifier() {
        let pair = PkcePair::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pair.verifier.as_bytes()));
        assert_eq!(pair.challenge, expected);
    }

    #[test]
    fn challenge_and_verifier_carry_no_padding() {
        let pair = PkcePair::generate();
        assert!(!pair.verifier.contains('='));
        assert!(!pair.challenge.contains('='));
    }

    #[test]
    fn verifier_length_stays_in_pkce_window() {
        for num_bytes in [0, 32, 64, 96, 200] {
            let pair = PkcePair::with_verifier_bytes(num_bytes);
            assert!(
                (43..=128).contains(&pair.verifier.len()),
                "verifier of {} chars for {num_bytes} bytes",
                pair.verifier.len()
            );
        }
    }

    #[test]
    fn pairs_are_unique_per_attempt() {
        let a = PkcePair::generate();
        let b = PkcePair::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn state_is_32_lowercase_hex_chars() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        assert!(state
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(state, generate_state());
    }
}
