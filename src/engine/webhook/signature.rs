//! HMAC-SHA256 webhook signatures

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature of the request body
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Keyed signer, initialized once and reused for every delivery.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub fn new(secret: &[u8]) -> Self {
        // HMAC takes keys of any length
        let mac = <HmacSha256 as Mac>::new_from_slice(secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        Self { mac }
    }

    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, body: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

/// Hex-encoded HMAC-SHA256 of `body` keyed by `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    Signer::new(secret).sign(body)
}

pub fn verify(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    Signer::new(secret).verify(body, signature_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"firmware.uploaded"}"#;
    const EXPECTED: &str = "b7a5c5287ee4d473f03d2ae8a0c395921bfa6be74b7b5ce443f9cf905a35aadd";

    #[test]
    fn test_sign_known_vector() {
        assert_eq!(sign(b"secret", BODY), EXPECTED);
    }

    #[test]
    fn test_signer_is_reusable() {
        let signer = Signer::new(b"secret");
        assert_eq!(signer.sign(BODY), EXPECTED);
        assert_eq!(signer.sign(BODY), EXPECTED);
    }

    #[test]
    fn test_verify() {
        assert!(verify(b"secret", BODY, EXPECTED));
        assert!(verify(b"secret", BODY, &EXPECTED.to_uppercase()));
        assert!(!verify(b"other", BODY, EXPECTED));
        assert!(!verify(b"secret", b"{}", EXPECTED));
        assert!(!verify(b"secret", BODY, "not-hex"));
    }
}
