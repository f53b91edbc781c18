//! The authorization request pipeline.
//!
//! Coordinates consent delegation, scope and audience grants, signing key
//! resolution, identity-token claims assembly and response minting,
//! mapping every failure onto the RFC 6749 error surface.

pub mod claims;
pub mod consent;
pub mod engine;
pub mod error;
pub mod keys;

use crate::config::AccessTokenStrategy;
use crate::oauth2::claims::{normalize_issuer, IdTokenClaims};
use crate::oauth2::consent::{ConsentError, ConsentOutcome};
use crate::oauth2::engine::{AuthorizeRequest, AuthorizeResponse, EngineError, OidcSession};
use crate::oauth2::keys::KeyError;
use crate::state::AppState;
use axum::response::Response;
use chrono::Utc;
use log::error;
use std::collections::HashMap;
use thiserror::Error;

/// Outcome of one authorization attempt.
pub enum AuthorizeOutcome {
    /// A minted response, ready for the engine's writer
    Issued(AuthorizeResponse),
    /// The consent subsystem already produced the full response; nothing
    /// further may be written
    Abort(Response),
}

/// Errors crossing the orchestrator boundary
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("consent resolution failed: {0}")]
    Consent(#[from] ConsentError),
    #[error("signing key resolution failed: {0}")]
    Keys(#[from] KeyError),
    #[error("authorize response could not be minted: {0}")]
    Engine(#[from] EngineError),
}

/// Run the authorization pipeline for a parsed request.
///
/// No retries: every collaborator failure is logged where it is detected
/// and surfaced exactly once. A consent abort is not a failure and is
/// passed through untouched.
pub async fn issue_authorize_response(
    state: &AppState,
    request: &mut AuthorizeRequest,
) -> Result<AuthorizeOutcome, IssueError> {
    let session = match state.consent.resolve(request).await {
        Ok(ConsentOutcome::Abort(response)) => return Ok(AuthorizeOutcome::Abort(response)),
        Ok(ConsentOutcome::Session(session)) => session,
        Err(err) => {
            error!("consent resolution failed: {}", err);
            return Err(err.into());
        }
    };

    // Grants are appended on top of whatever the protocol layer already
    // granted, never replacing it.
    for scope in &session.granted_scope {
        request.grant_scope(scope.clone());
    }
    for audience in &session.granted_audience {
        request.grant_audience(audience.clone());
    }

    let id_token_key_id = match state.id_token_keys.current_key_id().await {
        Ok(key_id) => key_id,
        Err(err) => {
            error!("ID token signing key resolution failed: {}", err);
            return Err(err.into());
        }
    };

    // Opaque access tokens carry no key id.
    let access_token_key_id = match state.config.access_token_strategy {
        AccessTokenStrategy::Jwt => match state.access_token_keys.current_key_id().await {
            Ok(key_id) => Some(key_id),
            Err(err) => {
                error!("access token signing key resolution failed: {}", err);
                return Err(err.into());
            }
        },
        AccessTokenStrategy::Opaque => None,
    };

    request.set_id(session.challenge.clone());

    let mut claims = IdTokenClaims {
        subject: session.subject_identifier.clone(),
        issuer: normalize_issuer(&state.config.issuer_url),
        issued_at: Utc::now(),
        auth_time: session.authenticated_at,
        requested_at: session.requested_at,
        acr: session.acr.clone(),
        extra: session.id_token_extra.clone(),
    };
    claims.add("sid", session.login_session_id.clone());

    let mut id_token_headers = HashMap::new();
    // Required for key lookup on the JWK endpoint.
    id_token_headers.insert(
        "kid".to_string(),
        serde_json::Value::String(id_token_key_id),
    );

    let oidc_session = OidcSession {
        claims,
        id_token_headers,
        subject: session.subject.clone(),
        client_id: request.client_id().to_string(),
        consent_challenge: session.challenge.clone(),
        access_token_key_id,
        access_token_extra: session.access_token_extra.clone(),
    };

    match state.engine.issue(request, &oidc_session).await {
        Ok(response) => Ok(AuthorizeOutcome::Issued(response)),
        Err(err) => {
            error!("minting the authorize response failed: {}", err);
            Err(err.into())
        }
    }
}
