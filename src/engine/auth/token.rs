//! OIDC bearer token authentication
//!
//! Tokens are verified against the issuer's JWKS. Keys are discovered from
//! `<issuer>/.well-known/openid-configuration`, cached for a TTL, and
//! refetched when stale or when a token names an unknown `kid`.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthError, Authenticator, Role};

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    /// Required `aud` value. Not checked when `None`.
    pub audience: Option<String>,
    pub admin_role: String,
    pub device_role: String,
    pub cache_ttl: Duration,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Role-bearing claims (Keycloak layout)
#[derive(Debug, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub realm_access: Option<RoleSet>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleSet>,
}

impl TokenClaims {
    /// Realm roles first, then roles of any client.
    pub fn has_role(&self, role: &str) -> bool {
        if role.is_empty() {
            return false;
        }
        let in_realm = self
            .realm_access
            .as_ref()
            .is_some_and(|r| r.roles.iter().any(|r| r == role));
        in_realm
            || self
                .resource_access
                .values()
                .any(|client| client.roles.iter().any(|r| r == role))
    }
}

#[derive(Deserialize)]
struct ProviderMetadata {
    jwks_uri: String,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct TokenAuthenticator {
    settings: TokenSettings,
    client: reqwest::Client,
    /// `None` for a fixed key set that never refreshes
    jwks_uri: Option<String>,
    cache: RwLock<CachedKeys>,
}

impl TokenAuthenticator {
    /// Discover the JWKS endpoint from the issuer and fetch the initial keys.
    pub async fn discover(mut settings: TokenSettings) -> Result<Self, AuthError> {
        settings.issuer = settings.issuer.trim().trim_end_matches('/').to_string();
        if settings.issuer.is_empty() {
            return Err(AuthError::Discovery("issuer URL is not configured".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let discovery_url = format!("{}/.well-known/openid-configuration", settings.issuer);
        let response = client.get(&discovery_url).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{} returned {}",
                discovery_url,
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response.json().await?;
        let keys = fetch_keys(&client, &metadata.jwks_uri).await?;

        Ok(Self {
            settings,
            client,
            jwks_uri: Some(metadata.jwks_uri),
            cache: RwLock::new(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            }),
        })
    }

    /// Verify against a fixed key set.
    pub fn with_keys(mut settings: TokenSettings, keys: JwkSet) -> Self {
        settings.issuer = settings.issuer.trim().trim_end_matches('/').to_string();
        Self {
            settings,
            client: reqwest::Client::new(),
            jwks_uri: None,
            cache: RwLock::new(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            }),
        }
    }

    /// Check signature, issuer, expiry and audience; return the role claims.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token)?;
        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.settings.issuer]);
        match &self.settings.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<TokenClaims>(token, &key, &validation)?;
        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read().await;
            let fresh = cache.fetched_at.elapsed() < self.settings.cache_ttl;
            if fresh || self.jwks_uri.is_none() {
                if let Some(key) = find_key(&cache.keys, kid)? {
                    return Ok(key);
                }
            }
        }

        let Some(jwks_uri) = &self.jwks_uri else {
            return Err(AuthError::UnknownKey(kid.map(str::to_string)));
        };

        debug!(kid = ?kid, "refreshing JWKS");
        let keys = fetch_keys(&self.client, jwks_uri).await?;
        let key = find_key(&keys, kid)?;
        *self.cache.write().await = CachedKeys {
            keys,
            fetched_at: Instant::now(),
        };
        key.ok_or_else(|| AuthError::UnknownKey(kid.map(str::to_string)))
    }

    fn role_name(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.settings.admin_role,
            Role::Device => &self.settings.device_role,
        }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authorize(&self, headers: &HeaderMap, role: Role) -> bool {
        let Some(token) = bearer_token(headers) else {
            return false;
        };
        match self.verify(token).await {
            Ok(claims) => claims.has_role(self.role_name(role)),
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                false
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Key matching `kid`, or the only key when the token carries no `kid`.
fn find_key(keys: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, AuthError> {
    let jwk = match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    };
    jwk.map(DecodingKey::from_jwk).transpose().map_err(AuthError::from)
}

async fn fetch_keys(client: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, AuthError> {
    let response = client.get(jwks_uri).send().await?.error_for_status()?;
    Ok(response.json().await?)
}
