//! HMAC-SHA256 verification of inbound review-platform webhooks.
//!
//! Signatures are hex digests of the raw request body keyed with the
//! platform's shared secret, optionally prefixed with `sha256=`.
//! The lowercase hex digest is compared as a string in constant time, so a
//! header that only differs in letter case does not verify.

use ring::hmac;
use serde::Deserialize;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Yelp,
    Google,
    Apple,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Yelp => "yelp",
            Platform::Google => "google",
            Platform::Apple => "apple",
        }
    }

    /// Header carrying the body signature
    pub fn signature_header(&self) -> &'static str {
        match self {
            Platform::Facebook => "x-hub-signature-256",
            _ => "x-signature-256",
        }
    }
}

/// Hex-encoded HMAC-SHA256 of `body`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hex::encode(hmac::sign(&key, body).as_ref())
}

/// Checks a signature header value against the body
pub fn verify(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let hex_digest = signature.strip_prefix("sha256=").unwrap_or(signature);

    let expected = sign(secret, body);
    bool::from(expected.as_bytes().ct_eq(hex_digest.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test_secret";
    const BODY: &[u8] = br#"{"entry":[{"changes":[{"field":"ratings"}]}]}"#;

    #[test]
    fn test_correct_signature_is_accepted() {
        let signature = sign(SECRET, BODY);
        assert!(verify(SECRET, BODY, &signature));
        assert!(verify(SECRET, BODY, &format!("sha256={}", signature)));
    }

    #[test]
    fn test_any_payload_byte_mutation_is_rejected() {
        let signature = sign(SECRET, BODY);

        for i in 0..BODY.len() {
            let mut mutated = BODY.to_vec();
            mutated[i] ^= 0x01;
            assert!(!verify(SECRET, &mutated, &signature), "byte {} accepted", i);
        }
    }

    #[test]
    fn test_any_signature_byte_mutation_is_rejected() {
        let signature = hex::decode(sign(SECRET, BODY)).unwrap();

        for i in 0..signature.len() {
            let mut mutated = signature.clone();
            mutated[i] ^= 0x80;
            assert!(!verify(SECRET, BODY, &hex::encode(&mutated)), "byte {} accepted", i);
        }
    }

    #[test]
    fn test_any_signature_header_character_change_is_rejected() {
        let signature = sign(SECRET, BODY);

        for (i, c) in signature.char_indices() {
            let mut variants = vec![c.to_ascii_uppercase()];
            variants.push(if c == '0' { '1' } else { '0' });

            for replacement in variants.into_iter().filter(|r| *r != c) {
                let mut mutated = signature.clone();
                mutated.replace_range(i..i + 1, &replacement.to_string());
                assert!(
                    !verify(SECRET, BODY, &mutated),
                    "char {} -> {} accepted",
                    i,
                    replacement
                );
            }
        }
    }

    #[test]
    fn test_uppercase_signature_is_rejected() {
        let signature = sign(SECRET, BODY);
        assert!(signature.chars().any(|c| c.is_ascii_lowercase()));
        assert!(!verify(SECRET, BODY, &signature.to_ascii_uppercase()));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let signature = sign(b"other-secret", BODY);
        assert!(!verify(SECRET, BODY, &signature));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(!verify(SECRET, BODY, "not-hex"));
        assert!(!verify(SECRET, BODY, ""));
        assert!(!verify(SECRET, BODY, "sha256="));
    }

    #[test]
    fn test_platform_headers() {
        assert_eq!(Platform::Facebook.signature_header(), "x-hub-signature-256");
        assert_eq!(Platform::Yelp.signature_header(), "x-signature-256");
    }
}
