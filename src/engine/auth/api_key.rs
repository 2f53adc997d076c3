//! Static API key authentication

use async_trait::async_trait;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use super::{Authenticator, Role};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";
pub const DEVICE_KEY_HEADER: &str = "X-Device-Key";

type KeyHash = [u8; 32];

/// Matches `X-Admin-Key` / `X-Device-Key` against configured keys.
///
/// Keys are kept only as SHA-256 digests. An empty configured key
/// authorizes nobody.
pub struct ApiKeyAuthenticator {
    admin_key: Option<KeyHash>,
    device_key: Option<KeyHash>,
}

impl ApiKeyAuthenticator {
    pub fn new(admin_key: &str, device_key: &str) -> Self {
        Self {
            admin_key: hash_configured(admin_key),
            device_key: hash_configured(device_key),
        }
    }

    pub fn check(&self, headers: &HeaderMap, role: Role) -> bool {
        let (expected, header) = match role {
            Role::Admin => (&self.admin_key, ADMIN_KEY_HEADER),
            Role::Device => (&self.device_key, DEVICE_KEY_HEADER),
        };
        let Some(expected) = expected else {
            return false;
        };
        headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(|presented| constant_time_eq(&hash_key(presented), expected))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authorize(&self, headers: &HeaderMap, role: Role) -> bool {
        self.check(headers, role)
    }
}

fn hash_configured(key: &str) -> Option<KeyHash> {
    let key = key.trim();
    (!key.is_empty()).then(|| hash_key(key))
}

fn hash_key(key: &str) -> KeyHash {
    Sha256::digest(key.as_bytes()).into()
}

fn constant_time_eq(a: &KeyHash, b: &KeyHash) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
