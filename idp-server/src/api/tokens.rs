//! Admin endpoint minting a session for a subject and client.

use crate::errors::ApiError;
use crate::oauth2::engine::{secure_token, AuthorizeParams};
use crate::oauth2::{issue_authorize_response, AuthorizeOutcome};
use crate::state::AppState;
use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use log::info;
use serde::Deserialize;

/// Request payload used to create a new session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub client_id: String,
    pub subject: String,
    #[serde(default)]
    pub scope: String,
}

/// `POST /tokens`: create a session for a subject for a specific OAuth
/// 2.0 client by re-entering the standard authorization pipeline.
///
/// The authorization parameters come from the client registration and the
/// request body; redirect URI, scope defaults and state are never
/// literals.
pub async fn post_session(
    State(state): State<AppState>,
    Json(session_request): Json<SessionRequest>,
) -> Response {
    if session_request.subject.is_empty() {
        return ApiError::bad_request("subject must not be empty").into_response();
    }
    let client = match state.clients.get(&session_request.client_id) {
        Some(client) => client.clone(),
        None => {
            return ApiError::not_found(format!(
                "client '{}' is unknown",
                session_request.client_id
            ))
            .into_response()
        }
    };

    let request_state = match secure_token() {
        Ok(token) => token,
        Err(e) => return ApiError::internal(e).into_response(),
    };
    let scope = if session_request.scope.is_empty() {
        client.scopes.join(" ")
    } else {
        session_request.scope.clone()
    };

    let params = AuthorizeParams {
        response_type: "code".to_string(),
        client_id: client.id.clone(),
        redirect_uri: client.default_redirect_uri().map(str::to_string),
        scope: Some(scope),
        audience: None,
        state: Some(request_state),
        consent_verifier: None,
    };

    let mut request = match state.engine.parse(params) {
        Ok(request) => request,
        Err(err) => return ApiError::bad_request(err).into_response(),
    };

    info!(
        "minting session for subject '{}' via client '{}'",
        session_request.subject, client.id
    );

    match issue_authorize_response(&state, &mut request).await {
        Ok(AuthorizeOutcome::Issued(_)) => StatusCode::NO_CONTENT.into_response(),
        // The consent subsystem already answered; hand its response on
        // unchanged.
        Ok(AuthorizeOutcome::Abort(response)) => response,
        Err(err) => {
            // The admin surface never redirects errors.
            crate::oauth2::error::ProtocolError::from(err)
                .into_direct_response(state.config.share_debug)
        }
    }
}
