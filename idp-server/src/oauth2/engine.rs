//! Protocol request and response models, and the response engine
//! capability that parses authorization requests and mints responses.

use crate::clients::ClientStore;
use crate::oauth2::claims::IdTokenClaims;
use crate::oauth2::error::ProtocolError;
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use http::{header::LOCATION, StatusCode};
use log::debug;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Lifetime of access tokens minted on the implicit path.
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Query parameters accepted by the authorization endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    pub redirect_uri: Option<String>,
    /// Requested scopes, space-separated
    pub scope: Option<String>,
    /// Requested audiences, space-separated
    pub audience: Option<String>,
    /// Opaque client state echoed back on the redirect
    pub state: Option<String>,
    /// Verifier linking back to an accepted consent session
    pub consent_verifier: Option<String>,
}

/// A parsed authorization request, owned by the orchestrator for the
/// lifetime of one authorization attempt.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    id: String,
    client_id: String,
    redirect_uri: Url,
    // Checked once at parse time, read many times afterwards.
    redirect_uri_valid: bool,
    response_type: String,
    state: Option<String>,
    consent_verifier: Option<String>,
    requested_scope: Vec<String>,
    requested_audience: Vec<String>,
    granted_scope: Vec<String>,
    granted_audience: Vec<String>,
}

impl AuthorizeRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: Url,
        redirect_uri_valid: bool,
        response_type: impl Into<String>,
        state: Option<String>,
        consent_verifier: Option<String>,
        requested_scope: Vec<String>,
        requested_audience: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            redirect_uri,
            redirect_uri_valid,
            response_type: response_type.into(),
            state,
            consent_verifier,
            requested_scope,
            requested_audience,
            granted_scope: Vec::new(),
            granted_audience: Vec::new(),
        }
    }

    /// Correlation id of this authorization attempt.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Re-key the attempt, linking it to the consent decision.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Whether the redirect URI was validated against the client
    /// registration. The check runs once at parse time and is cached here.
    pub fn is_redirect_uri_valid(&self) -> bool {
        self.redirect_uri_valid
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn consent_verifier(&self) -> Option<&str> {
        self.consent_verifier.as_deref()
    }

    pub fn requested_scope(&self) -> &[String] {
        &self.requested_scope
    }

    pub fn requested_audience(&self) -> &[String] {
        &self.requested_audience
    }

    pub fn granted_scope(&self) -> &[String] {
        &self.granted_scope
    }

    pub fn granted_audience(&self) -> &[String] {
        &self.granted_audience
    }

    /// Append a scope to the granted set. Grants are only ever appended;
    /// whatever was granted before is preserved.
    pub fn grant_scope(&mut self, scope: impl Into<String>) {
        self.granted_scope.push(scope.into());
    }

    /// Append an audience to the granted set.
    pub fn grant_audience(&mut self, audience: impl Into<String>) {
        self.granted_audience.push(audience.into());
    }
}

/// Parameters minted for a successful authorization response.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeResponse {
    pub parameters: Vec<(String, String)>,
    /// Encoded into the URL fragment instead of the query, as implicit
    /// responses require
    pub in_fragment: bool,
}

/// Everything the response engine needs to mint tokens for one request.
#[derive(Debug, Clone)]
pub struct OidcSession {
    pub claims: IdTokenClaims,
    /// Header values attached to the signed identity token; carries the
    /// `kid` consumers use to look up the verification key
    pub id_token_headers: HashMap<String, serde_json::Value>,
    pub subject: String,
    pub client_id: String,
    pub consent_challenge: String,
    /// Key id labeling signed access tokens, absent for opaque tokens
    pub access_token_key_id: Option<String>,
    /// Extra access token claims from the consent session, verbatim
    pub access_token_extra: HashMap<String, serde_json::Value>,
}

/// Errors that can occur while minting an authorization response
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to mint token material: {0}")]
    TokenMaterial(String),
    #[error("unsupported response type: {0}")]
    UnsupportedResponseType(String),
}

/// The protocol response engine: parses authorization requests, mints
/// responses and encodes them onto the wire per RFC 6749.
#[async_trait]
pub trait ResponseEngine: Send + Sync {
    /// Parse and validate raw parameters into an [`AuthorizeRequest`].
    fn parse(&self, params: AuthorizeParams) -> Result<AuthorizeRequest, ProtocolError>;

    /// Mint an authorization response for a consented request.
    async fn issue(
        &self,
        request: &AuthorizeRequest,
        session: &OidcSession,
    ) -> Result<AuthorizeResponse, EngineError>;

    /// Encode a minted response per the requested response type.
    fn write_response(&self, request: &AuthorizeRequest, response: AuthorizeResponse) -> Response {
        let mut target = request.redirect_uri().clone();
        if response.in_fragment {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(
                    response
                        .parameters
                        .iter()
                        .map(|(name, value)| (name.as_str(), value.as_str())),
                )
                .finish();
            target.set_fragment(Some(&encoded));
        } else {
            target.query_pairs_mut().extend_pairs(
                response
                    .parameters
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            );
        }
        found(target.as_str())
    }

    /// Encode a protocol error onto the request's redirect URI.
    ///
    /// Callers must only take this path when the redirect URI was
    /// validated; untrusted targets belong to the error responder.
    fn write_error(
        &self,
        request: &AuthorizeRequest,
        error: &ProtocolError,
        share_debug: bool,
    ) -> Response {
        let mut target = request.redirect_uri().clone();
        {
            let mut pairs = target.query_pairs_mut();
            pairs.extend_pairs(error.to_query_pairs(share_debug));
            if let Some(state) = request.state() {
                pairs.append_pair("state", state);
            }
        }
        found(target.as_str())
    }
}

/// The shipped response engine: authorization code and implicit token
/// responses against the in-memory client registry. Token persistence and
/// deeper wire concerns (PKCE, introspection) live outside this core.
pub struct CodeEngine {
    clients: Arc<ClientStore>,
}

impl CodeEngine {
    pub fn new(clients: Arc<ClientStore>) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl ResponseEngine for CodeEngine {
    fn parse(&self, params: AuthorizeParams) -> Result<AuthorizeRequest, ProtocolError> {
        if params.client_id.is_empty() {
            return Err(ProtocolError::invalid_request("client_id is required"));
        }
        let client = self.clients.get(&params.client_id).ok_or_else(|| {
            ProtocolError::invalid_client(format!("client '{}' is unknown", params.client_id))
        })?;

        let redirect_uri_raw = match &params.redirect_uri {
            Some(uri) => {
                if !client.is_redirect_uri_registered(uri) {
                    return Err(ProtocolError::invalid_request(
                        "redirect_uri is not registered for this client",
                    ));
                }
                uri.clone()
            }
            None => client
                .default_redirect_uri()
                .ok_or_else(|| {
                    ProtocolError::invalid_request("client has no registered redirect_uri")
                })?
                .to_string(),
        };
        let redirect_uri = Url::parse(&redirect_uri_raw)
            .map_err(|_| ProtocolError::invalid_request("redirect_uri is not a valid URL"))?;

        if !matches!(params.response_type.as_str(), "code" | "token") {
            return Err(ProtocolError::unsupported_response_type(format!(
                "response_type '{}' is not supported",
                params.response_type
            )));
        }

        let requested_scope = split_values(params.scope);
        if !client.scopes.is_empty() {
            if let Some(scope) = requested_scope
                .iter()
                .find(|scope| !client.scopes.contains(scope))
            {
                return Err(ProtocolError::invalid_scope(format!(
                    "the client may not request scope '{}'",
                    scope
                )));
            }
        }
        let requested_audience = split_values(params.audience);

        let id = secure_token().map_err(|e| {
            ProtocolError::server_error("request id could not be minted").with_debug(e.to_string())
        })?;

        Ok(AuthorizeRequest::new(
            id,
            params.client_id,
            redirect_uri,
            true,
            params.response_type,
            params.state,
            params.consent_verifier,
            requested_scope,
            requested_audience,
        ))
    }

    async fn issue(
        &self,
        request: &AuthorizeRequest,
        session: &OidcSession,
    ) -> Result<AuthorizeResponse, EngineError> {
        debug!(
            "minting {} response for subject '{}' via client '{}', challenge '{}'",
            request.response_type(),
            session.subject,
            session.client_id,
            session.consent_challenge
        );

        match request.response_type() {
            "code" => {
                let code = secure_token()?;
                let mut parameters = vec![
                    ("code".to_string(), code),
                    ("scope".to_string(), request.granted_scope().join(" ")),
                ];
                if let Some(state) = request.state() {
                    parameters.push(("state".to_string(), state.to_string()));
                }
                Ok(AuthorizeResponse {
                    parameters,
                    in_fragment: false,
                })
            }
            "token" => {
                let access_token = secure_token()?;
                let mut parameters = vec![
                    ("access_token".to_string(), access_token),
                    ("token_type".to_string(), "bearer".to_string()),
                    (
                        "expires_in".to_string(),
                        DEFAULT_TOKEN_TTL_SECS.to_string(),
                    ),
                    ("scope".to_string(), request.granted_scope().join(" ")),
                ];
                if let Some(state) = request.state() {
                    parameters.push(("state".to_string(), state.to_string()));
                }
                Ok(AuthorizeResponse {
                    parameters,
                    in_fragment: true,
                })
            }
            other => Err(EngineError::UnsupportedResponseType(other.to_string())),
        }
    }
}

/// A 302 Found redirect, the status RFC 6749 prescribes for the
/// authorization endpoint.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Generate secure random token material: 32 random bytes base64url
/// encoded without padding.
pub(crate) fn secure_token() -> Result<String, EngineError> {
    let mut rng = rand::thread_rng();
    let token_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();

    let token = URL_SAFE_NO_PAD.encode(&token_bytes);
    if token.is_empty() {
        return Err(EngineError::TokenMaterial(
            "generated empty token".to_string(),
        ));
    }

    Ok(token)
}

fn split_values(raw: Option<String>) -> Vec<String> {
    raw.map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
