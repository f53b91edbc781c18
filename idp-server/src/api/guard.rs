//! Authentication and authorization gates for the admin surface.

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use idp_policy::{evaluate, Decision, ExactMatcher, RequestContext};
use log::warn;

/// Require a known subject presenting a valid credential.
///
/// Anything else terminates the chain with 401 before the wrapped handler,
/// including any authorization gate nested inside it, runs.
pub async fn require_authentication(request: Request<Body>, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_authenticated);

    if !authenticated {
        warn!(
            "rejecting unauthenticated request to {}",
            request.uri().path()
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(request).await
}

/// Require a policy decision allowing `action` on `resource`.
///
/// Deny-overrides over the context's policy set; a missing context or an
/// empty policy set denies by default.
pub async fn authorize_request(
    resource: &'static str,
    action: &'static str,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = request
        .extensions()
        .get::<RequestContext>()
        .map_or(Decision::Deny, |context| {
            let subject = context.subject().map(|s| s.as_str()).unwrap_or_default();
            evaluate(context.policies(), subject, resource, action, &ExactMatcher)
        });

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Deny => {
            warn!("denied '{}' on '{}'", action, resource);
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use idp_policy::{Credential, Effect, Policy, Subject};
    use tower::ServiceExt;

    struct Case {
        subject: Option<&'static str>,
        credential: Option<Credential>,
        policies: Option<Vec<Policy>>,
        resource: &'static str,
        action: &'static str,
        expected: StatusCode,
    }

    fn article_policy(effect: Effect, subject: &str) -> Policy {
        Policy::new(
            effect,
            vec![subject.to_string()],
            vec!["/articles/74251".to_string()],
            vec!["create".to_string()],
        )
    }

    fn cases() -> Vec<Case> {
        vec![
            // Invalid credential fails authentication.
            Case {
                subject: Some("max"),
                credential: Some(Credential::invalid()),
                policies: Some(vec![]),
                resource: "",
                action: "",
                expected: StatusCode::UNAUTHORIZED,
            },
            // Valid credential but empty policy set: default deny.
            Case {
                subject: Some("max"),
                credential: Some(Credential::valid()),
                policies: Some(vec![]),
                resource: "",
                action: "",
                expected: StatusCode::FORBIDDEN,
            },
            // Matching allow policy passes both gates.
            Case {
                subject: Some("peter"),
                credential: Some(Credential::valid()),
                policies: Some(vec![article_policy(Effect::Allow, "peter")]),
                resource: "/articles/74251",
                action: "create",
                expected: StatusCode::OK,
            },
            // The same policy with effect deny forbids.
            Case {
                subject: Some("peter"),
                credential: Some(Credential::valid()),
                policies: Some(vec![article_policy(Effect::Deny, "peter")]),
                resource: "/articles/74251",
                action: "create",
                expected: StatusCode::FORBIDDEN,
            },
            // A policy scoped to someone else does not match: default deny.
            Case {
                subject: Some("max"),
                credential: Some(Credential::valid()),
                policies: Some(vec![article_policy(Effect::Allow, "peter")]),
                resource: "/articles/74251",
                action: "create",
                expected: StatusCode::FORBIDDEN,
            },
            // No credential at all: the authentication gate dominates even
            // with matching policies present.
            Case {
                subject: Some("max"),
                credential: None,
                policies: Some(vec![article_policy(Effect::Allow, "peter")]),
                resource: "/articles/74251",
                action: "create",
                expected: StatusCode::UNAUTHORIZED,
            },
            // No subject: authentication fails.
            Case {
                subject: None,
                credential: Some(Credential::valid()),
                policies: Some(vec![]),
                resource: "",
                action: "",
                expected: StatusCode::UNAUTHORIZED,
            },
            // Absent policy set behaves like an empty one.
            Case {
                subject: Some("max"),
                credential: Some(Credential::valid()),
                policies: None,
                resource: "",
                action: "",
                expected: StatusCode::FORBIDDEN,
            },
        ]
    }

    /// A router with the full guard chain and a context injected from the
    /// test case, mirroring what the context middleware produces.
    fn guarded_app(case: &Case) -> Router {
        let context = RequestContext::new(
            case.subject.map(Subject::new),
            case.credential.clone(),
            case.policies.clone().unwrap_or_default(),
        );
        let resource = case.resource;
        let action = case.action;

        Router::new()
            .route("/test", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(
                move |request: Request<Body>, next: Next| {
                    authorize_request(resource, action, request, next)
                },
            ))
            .route_layer(middleware::from_fn(require_authentication))
            .layer(middleware::from_fn(
                move |mut request: Request<Body>, next: Next| {
                    let context = context.clone();
                    async move {
                        request.extensions_mut().insert(context);
                        next.run(request).await
                    }
                },
            ))
    }

    #[tokio::test]
    async fn test_guard_chain() {
        for (index, case) in cases().into_iter().enumerate() {
            let app = guarded_app(&case);
            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/test")
                        .body(Body::empty())
                        .expect("Failed to build request"),
                )
                .await
                .expect("Failed to send request");

            assert_eq!(response.status(), case.expected, "Case {}", index);
        }
    }

    #[tokio::test]
    async fn test_authentication_failure_short_circuits_authorization() {
        // A marker gate sits where the authorization gate would; an
        // unauthenticated request must be rejected before reaching it.
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(
                |_request: Request<Body>, _next: Next| async move {
                    StatusCode::IM_A_TEAPOT.into_response()
                },
            ))
            .route_layer(middleware::from_fn(require_authentication));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .body(Body::empty())
                    .expect("Failed to build request"),
            )
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
