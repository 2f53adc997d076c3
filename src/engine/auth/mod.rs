//! Request authentication
//!
//! Two strategies sit behind [`Authenticator`]: static API keys, and OIDC
//! bearer tokens with role claims. Callers only ask whether a request may act
//! in a given [`Role`].

pub mod api_key;
pub mod token;

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::config::Config;

pub use api_key::{ApiKeyAuthenticator, ADMIN_KEY_HEADER, DEVICE_KEY_HEADER};
pub use token::{TokenAuthenticator, TokenClaims, TokenSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Device,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Device => write!(f, "device"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("No signing key for kid {0:?}")]
    UnknownKey(Option<String>),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the request behind `headers` may act as `role`.
    async fn authorize(&self, headers: &HeaderMap, role: Role) -> bool;
}

/// Pick the authenticator described by `config`.
///
/// OIDC is used when enabled and discovery succeeds. Otherwise requests are
/// checked against the configured API keys.
pub async fn from_config(config: &Config) -> Arc<dyn Authenticator> {
    if config.oidc.enabled {
        let oidc = &config.oidc;
        let audience = [&oidc.audience, &oidc.client_id]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string);
        let settings = TokenSettings {
            issuer: oidc.issuer_url.clone(),
            audience,
            admin_role: oidc.admin_role.clone(),
            device_role: oidc.device_role.clone(),
            cache_ttl: Duration::from_secs(oidc.jwks_cache_sec),
        };

        match TokenAuthenticator::discover(settings).await {
            Ok(auth) => {
                info!(issuer = %oidc.issuer_url, "OIDC authentication enabled");
                return Arc::new(auth);
            }
            Err(e) => {
                warn!(error = %e, "OIDC enabled but unavailable, falling back to API keys");
            }
        }
    }

    Arc::new(ApiKeyAuthenticator::new(&config.admin_key, &config.device_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_issuer_falls_back_to_api_keys() {
        let mut config = Config::default();
        config.admin_key = "admin".into();
        config.oidc.enabled = true;
        config.oidc.issuer_url = "http://127.0.0.1:9/realms/fw".into();

        let auth = from_config(&config).await;
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, "admin".parse().unwrap());
        assert!(auth.authorize(&headers, Role::Admin).await);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::Device.to_string(), "device");
    }
}
