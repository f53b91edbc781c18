//! The standard authorization endpoint.

use crate::oauth2::engine::AuthorizeParams;
use crate::oauth2::error::write_authorize_error;
use crate::oauth2::{issue_authorize_response, AuthorizeOutcome};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::Response;
use log::error;

/// `GET /oauth2/auth`: authenticate the end user and issue tokens for a
/// client, per RFC 6749 section 4.1.1.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    // A request that cannot be parsed has no trustworthy redirect URI, so
    // the error responder writes it without a request.
    let mut request = match state.engine.parse(params) {
        Ok(request) => request,
        Err(err) => {
            error!("authorize request rejected: {}", err);
            return write_authorize_error(state.engine.as_ref(), &state.config, None, err);
        }
    };

    match issue_authorize_response(&state, &mut request).await {
        Ok(AuthorizeOutcome::Issued(response)) => state.engine.write_response(&request, response),
        Ok(AuthorizeOutcome::Abort(response)) => response,
        Err(err) => {
            write_authorize_error(state.engine.as_ref(), &state.config, Some(&request), err.into())
        }
    }
}
