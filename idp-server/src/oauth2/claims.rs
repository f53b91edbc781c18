use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Claims signed into the identity token.
///
/// Expiry and audience are stamped by the protocol response engine; this
/// struct only carries what the orchestrator assembles from the consent
/// session and configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdTokenClaims {
    /// Subject identifier presented to the client
    #[serde(rename = "sub")]
    pub subject: String,
    /// Normalized issuer URL
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "auth_time", with = "chrono::serde::ts_seconds")]
    pub auth_time: DateTime<Utc>,
    #[serde(rename = "rat", with = "chrono::serde::ts_seconds")]
    pub requested_at: DateTime<Utc>,
    /// Authentication context class reference
    #[serde(rename = "acr")]
    pub acr: String,
    /// Passthrough claims from the consent session plus extensions such as
    /// the login session id (`sid`)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// Add an extension claim.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(name.into(), value.into());
    }
}

/// Normalize the configured issuer URL: trailing slashes are stripped and
/// exactly one is appended. Applying this twice yields the same string.
pub fn normalize_issuer(issuer: &str) -> String {
    format!("{}/", issuer.trim_end_matches('/'))
}
