//! Consent delegation: resolving an authorization request into a
//! consented session.

use crate::oauth2::engine::{found, AuthorizeRequest};
use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// A consented session produced by the consent subsystem.
///
/// Produced once per authorization attempt and consumed immediately: it
/// mutates the authorize request and feeds the identity token claims, then
/// has no life beyond that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentSession {
    /// Correlation id linking token issuance back to the consent decision
    pub challenge: String,
    /// Subject who granted consent
    pub subject: String,
    /// Identifier stamped into the identity token's `sub` claim, possibly
    /// pairwise
    pub subject_identifier: String,
    /// Authentication context class reference
    #[serde(default)]
    pub acr: String,
    /// Login session this consent belongs to
    #[serde(default)]
    pub login_session_id: String,
    pub authenticated_at: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub granted_scope: Vec<String>,
    #[serde(default)]
    pub granted_audience: Vec<String>,
    /// Extra claims for the identity token, passed through verbatim
    #[serde(default)]
    pub id_token_extra: HashMap<String, serde_json::Value>,
    /// Extra claims for the access token, passed through verbatim
    #[serde(default)]
    pub access_token_extra: HashMap<String, serde_json::Value>,
}

/// Outcome of consent delegation.
///
/// Abort is a control signal, not an error: the consent subsystem already
/// produced the full response (typically a redirect to the login and
/// consent UI) and the pipeline must write nothing further.
pub enum ConsentOutcome {
    Session(Box<ConsentSession>),
    Abort(Response),
}

/// Errors that can occur while resolving consent
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("failed to reach consent service: {0}")]
    Request(#[from] reqwest::Error),
    #[error("consent session not found")]
    SessionNotFound,
    #[error("consent verifier has already been used")]
    VerifierAlreadyUsed,
    #[error("consent service responded with status {0}")]
    InvalidStatus(StatusCode),
    #[error("failed to parse consent session: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolves a protocol request into a consented session.
#[async_trait]
pub trait ConsentStrategy: Send + Sync {
    async fn resolve(&self, request: &AuthorizeRequest) -> Result<ConsentOutcome, ConsentError>;
}

/// Consent delegation over HTTP.
///
/// A request arriving without a consent verifier is sent to the consent UI
/// carrying the attempt's correlation id; a request returning from the UI
/// carries a verifier that is exchanged for the accepted session.
pub struct HttpConsentStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConsentStrategy {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn redirect_to_consent(&self, request: &AuthorizeRequest) -> Response {
        let mut target = format!("{}/auth/consent", self.base_url.trim_end_matches('/'));
        match Url::parse(&target) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("consent_challenge", request.id())
                    .append_pair("client_id", request.client_id());
                target = url.to_string();
            }
            Err(_) => {
                // An unparsable base URL is a configuration problem; the
                // redirect still points at the raw target.
                log::warn!("consent URL '{}' is not a valid URL", self.base_url);
            }
        }
        found(&target)
    }
}

#[async_trait]
impl ConsentStrategy for HttpConsentStrategy {
    async fn resolve(&self, request: &AuthorizeRequest) -> Result<ConsentOutcome, ConsentError> {
        let verifier = match request.consent_verifier() {
            Some(verifier) => verifier,
            None => return Ok(ConsentOutcome::Abort(self.redirect_to_consent(request))),
        };

        let url = format!(
            "{}/sessions/{}",
            self.base_url.trim_end_matches('/'),
            verifier
        );
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ConsentError::SessionNotFound),
            StatusCode::GONE => Err(ConsentError::VerifierAlreadyUsed),
            status if !status.is_success() => Err(ConsentError::InvalidStatus(status)),
            _ => {
                let body = response.bytes().await?;
                let session: ConsentSession = serde_json::from_slice(&body)?;
                Ok(ConsentOutcome::Session(Box::new(session)))
            }
        }
    }
}
