//! The RFC 6749 error surface and the responder mapping internal failures
//! onto it.

use crate::config::IdpConfig;
use crate::oauth2::consent::ConsentError;
use crate::oauth2::engine::{found, AuthorizeRequest, EngineError, ResponseEngine};
use crate::oauth2::IssueError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use std::fmt;
use url::Url;

/// A normalized protocol failure, shaped per RFC 6749 §4.1.2.1.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    /// RFC 6749 error code, e.g. `invalid_request`
    pub name: String,
    pub description: String,
    pub hint: String,
    /// Internal detail. Crosses the wire only when debug sharing is
    /// explicitly enabled by configuration.
    pub debug: String,
    /// Status used when the error is written directly
    pub status: StatusCode,
}

impl ProtocolError {
    fn new(name: &str, description: impl Into<String>, status: StatusCode) -> Self {
        Self {
            name: name.to_string(),
            description: description.into(),
            hint: String::new(),
            debug: String::new(),
            status,
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new("invalid_request", description, StatusCode::BAD_REQUEST)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new("invalid_client", description, StatusCode::UNAUTHORIZED)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new("invalid_scope", description, StatusCode::BAD_REQUEST)
    }

    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new(
            "unsupported_response_type",
            description,
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(
            "server_error",
            description,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = debug.into();
        self
    }

    /// Query parameters for the redirect surface. The debug field is
    /// present iff `share_debug` is set and the error carries one.
    pub fn to_query_pairs(&self, share_debug: bool) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("error", self.name.as_str()),
            ("error_description", self.description.as_str()),
        ];
        if !self.hint.is_empty() {
            pairs.push(("error_hint", self.hint.as_str()));
        }
        if share_debug && !self.debug.is_empty() {
            pairs.push(("error_debug", self.debug.as_str()));
        }
        pairs
    }

    /// Write the error directly to the caller, without any redirect.
    pub fn into_direct_response(self, share_debug: bool) -> Response {
        let mut body = json!({
            "error": self.name,
            "error_description": self.description,
        });
        if !self.hint.is_empty() {
            body["error_hint"] = json!(self.hint);
        }
        if share_debug && !self.debug.is_empty() {
            body["error_debug"] = json!(self.debug);
        }
        (self.status, Json(body)).into_response()
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.description)
    }
}

impl From<IssueError> for ProtocolError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Consent(source) => match &source {
                ConsentError::SessionNotFound => {
                    Self::invalid_request("The consent session does not exist or has expired")
                        .with_hint("Restart the authorization flow")
                        .with_debug(source.to_string())
                }
                ConsentError::VerifierAlreadyUsed => {
                    Self::invalid_request("The consent verifier has already been used")
                        .with_debug(source.to_string())
                }
                _ => Self::server_error("Consent could not be resolved")
                    .with_debug(source.to_string()),
            },
            IssueError::Keys(source) => {
                Self::server_error("The signing key could not be resolved")
                    .with_debug(source.to_string())
            }
            IssueError::Engine(source) => match &source {
                EngineError::UnsupportedResponseType(response_type) => {
                    Self::unsupported_response_type(format!(
                        "response_type '{}' is not supported",
                        response_type
                    ))
                    .with_debug(source.to_string())
                }
                _ => Self::server_error("The authorize response could not be minted")
                    .with_debug(source.to_string()),
            },
        }
    }
}

/// Map an orchestrator failure onto the wire.
///
/// A validated redirect URI receives the RFC 6749 redirect encoding. An
/// untrusted one never does: the error goes to the operator-configured
/// error page when one is set, and straight back to the caller otherwise.
pub fn write_authorize_error(
    engine: &dyn ResponseEngine,
    config: &IdpConfig,
    request: Option<&AuthorizeRequest>,
    err: ProtocolError,
) -> Response {
    if let Some(request) = request {
        if request.is_redirect_uri_valid() {
            return engine.write_error(request, &err, config.share_debug);
        }
    }

    if let Some(error_url) = &config.error_url {
        if let Ok(mut target) = Url::parse(error_url) {
            target
                .query_pairs_mut()
                .extend_pairs(err.to_query_pairs(config.share_debug));
            return found(target.as_str());
        }
    }

    err.into_direct_response(config.share_debug)
}
