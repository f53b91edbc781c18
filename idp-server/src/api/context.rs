//! Builds the per-request context from the presented credential.

use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::HeaderMap;
use idp_policy::{Credential, RequestContext, Subject};

/// Verifies a presented credential and names the subject it belongs to.
pub trait Authenticator: Send + Sync {
    /// The authenticated subject for a verified credential, or None when
    /// the credential does not verify.
    fn authenticate(&self, token: &str) -> Option<Subject>;
}

/// API-key authentication for the admin surface.
///
/// The seam where a real token verifier would plug in; policies bind to
/// the subject this returns.
pub struct ApiKeyAuthenticator {
    api_key: String,
    subject: Subject,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            subject: Subject::new(subject),
        }
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Subject> {
        // An unset API key must not authenticate an empty bearer token.
        if self.api_key.is_empty() || token != self.api_key {
            return None;
        }
        Some(self.subject.clone())
    }
}

/// Attach an immutable [`RequestContext`] to the request.
///
/// The context carries the authenticated subject, the presented credential
/// and the applicable policy set; the guards further down the chain only
/// read it. It is built exactly once per request and never shared.
pub async fn attach_request_context(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let context = match bearer_token(request.headers()) {
        None => RequestContext::anonymous(),
        Some(token) => match state.authenticator.authenticate(&token) {
            Some(subject) => RequestContext::new(
                Some(subject),
                Some(Credential::valid()),
                state.policies.as_ref().clone(),
            ),
            None => RequestContext::new(None, Some(Credential::invalid()), Vec::new()),
        },
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| {
            if value.to_lowercase().starts_with("bearer ") {
                // Remove the "Bearer " prefix
                Some(value[7..].to_string())
            } else {
                None
            }
        })
}
