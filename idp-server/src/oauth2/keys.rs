//! Signing key resolution for identity and access tokens.

use async_trait::async_trait;
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while resolving the current signing key
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to reach key store: {0}")]
    Request(#[from] reqwest::Error),
    #[error("key store responded with status {0}")]
    InvalidStatus(StatusCode),
    #[error("failed to parse key set: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("key set '{0}' contains no signing key")]
    NoSigningKey(String),
}

/// Chooses which rotating key a token is signed and labeled with.
///
/// The key id is resolved per request and never cached in this layer, so a
/// rotation in the key store takes effect immediately.
#[async_trait]
pub trait SigningKeyStrategy: Send + Sync {
    /// The key id of the current signing key.
    async fn current_key_id(&self) -> Result<String, KeyError>;
}

/// A fixed key id, for wiring without a key store and for tests.
#[allow(dead_code)]
pub struct StaticKeyStrategy {
    key_id: String,
}

impl StaticKeyStrategy {
    #[allow(dead_code)]
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }
}

#[async_trait]
impl SigningKeyStrategy for StaticKeyStrategy {
    async fn current_key_id(&self) -> Result<String, KeyError> {
        Ok(self.key_id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    /// JWK `use` parameter; absent means the key may be used for anything
    #[serde(rename = "use", default)]
    usage: Option<String>,
}

/// Resolves the current key id from a JWK set served by the key store.
pub struct JwksKeyStrategy {
    client: reqwest::Client,
    base_url: String,
    set: String,
}

impl JwksKeyStrategy {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            set: set.into(),
        }
    }
}

#[async_trait]
impl SigningKeyStrategy for JwksKeyStrategy {
    async fn current_key_id(&self) -> Result<String, KeyError> {
        let url = format!("{}/keys/{}", self.base_url.trim_end_matches('/'), self.set);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(KeyError::InvalidStatus(response.status()));
        }

        let body = response.bytes().await?;
        let set: JwkSet = serde_json::from_slice(&body)?;
        set.keys
            .iter()
            .find(|key| key.usage.as_deref().map_or(true, |usage| usage == "sig"))
            .map(|key| key.kid.clone())
            .ok_or_else(|| KeyError::NoSigningKey(self.set.clone()))
    }
}
