pub(crate) mod authorize;
pub(crate) mod context;
pub(crate) mod guard;
pub(crate) mod health;
pub(crate) mod tokens;

use crate::state::AppState;
use axum::{
    body::Body,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Router,
};

/// Resource and action guarding the admin token surface.
pub(crate) const TOKENS_RESOURCE: &str = "rn:tokens";
pub(crate) const TOKENS_ACTION: &str = "create";

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(public_routes())
        .merge(admin_routes(state))
}

/// The authorization endpoint is consumed by end users and carries its own
/// protocol-level checks; it is not policy guarded.
fn public_routes() -> Router<AppState> {
    Router::new().route("/oauth2/auth", get(authorize::authorize_handler))
}

/// Admin routes sit behind the full guard chain. Layers run outermost
/// last-added: the request context is built first, then authentication,
/// then policy authorization.
fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/tokens", post(tokens::post_session))
        .route_layer(middleware::from_fn(
            |request: Request<Body>, next: Next| {
                guard::authorize_request(TOKENS_RESOURCE, TOKENS_ACTION, request, next)
            },
        ))
        .route_layer(middleware::from_fn(guard::require_authentication))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            context::attach_request_context,
        ))
}
