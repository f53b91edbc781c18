//! Shared fixtures for server tests: in-process collaborator doubles and a
//! fixture assembling the full application.

use crate::api::context::ApiKeyAuthenticator;
use crate::clients::{Client, ClientStore};
use crate::config::IdpConfig;
use crate::create_app;
use crate::oauth2::consent::{ConsentError, ConsentOutcome, ConsentSession, ConsentStrategy};
use crate::oauth2::engine::{
    found, AuthorizeParams, AuthorizeRequest, AuthorizeResponse, CodeEngine, EngineError,
    OidcSession, ResponseEngine,
};
use crate::oauth2::error::ProtocolError;
use crate::oauth2::keys::{KeyError, SigningKeyStrategy, StaticKeyStrategy};
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use chrono::{TimeZone, Utc};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use idp_policy::{Effect, Policy};
use log::LevelFilter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::Url;

fn test_client_list() -> Vec<Client> {
    vec![Client {
        id: "test-client".to_string(),
        redirect_uris: vec!["https://client.example/callback".to_string()],
        scopes: vec!["openid".to_string(), "offline".to_string()],
    }]
}

/// The client registry every test runs against.
pub(crate) fn test_clients() -> ClientStore {
    ClientStore::new(test_client_list())
}

/// JSON document matching [`test_clients`], for file-backed stores.
pub(crate) fn test_clients_json() -> Vec<u8> {
    serde_json::to_vec(&test_client_list()).unwrap()
}

/// An accepted consent session for subject "peter".
pub(crate) fn test_session() -> ConsentSession {
    ConsentSession {
        challenge: "challenge-123".to_string(),
        subject: "peter".to_string(),
        subject_identifier: "peter-pairwise".to_string(),
        acr: "aal1".to_string(),
        login_session_id: "login-session-1".to_string(),
        authenticated_at: Utc.with_ymd_and_hms(2024, 5, 4, 11, 58, 0).unwrap(),
        requested_at: Utc.with_ymd_and_hms(2024, 5, 4, 11, 59, 30).unwrap(),
        granted_scope: vec!["openid".to_string(), "offline".to_string()],
        granted_audience: vec!["https://api.example".to_string()],
        id_token_extra: HashMap::from([(
            "email".to_string(),
            serde_json::json!("peter@example.com"),
        )]),
        access_token_extra: HashMap::from([(
            "department".to_string(),
            serde_json::json!("engineering"),
        )]),
    }
}

/// A parsed authorization request for the test client.
pub(crate) fn test_authorize_request(consent_verifier: Option<&str>) -> AuthorizeRequest {
    AuthorizeRequest::new(
        "request-id-1",
        "test-client",
        Url::parse("https://client.example/callback").unwrap(),
        true,
        "code",
        Some("state-12345".to_string()),
        consent_verifier.map(str::to_string),
        vec!["openid".to_string()],
        Vec::new(),
    )
}

/// An assembled token session, for exercising the engine directly.
pub(crate) fn test_oidc_session() -> OidcSession {
    let session = test_session();
    OidcSession {
        claims: crate::oauth2::claims::IdTokenClaims {
            subject: session.subject_identifier.clone(),
            issuer: "https://idp.example/".to_string(),
            issued_at: Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap(),
            auth_time: session.authenticated_at,
            requested_at: session.requested_at,
            acr: session.acr.clone(),
            extra: session.id_token_extra.clone(),
        },
        id_token_headers: HashMap::from([(
            "kid".to_string(),
            serde_json::json!("id-token-key-1"),
        )]),
        subject: session.subject,
        client_id: "test-client".to_string(),
        consent_challenge: session.challenge,
        access_token_key_id: None,
        access_token_extra: session.access_token_extra,
    }
}

/// In-process consent double.
pub(crate) enum TestConsent {
    /// Resolve every request to this session
    Session(ConsentSession),
    /// Signal that the consent subsystem already answered
    Abort,
    /// Fail with a session-not-found error
    Fail,
}

#[async_trait]
impl ConsentStrategy for TestConsent {
    async fn resolve(&self, _request: &AuthorizeRequest) -> Result<ConsentOutcome, ConsentError> {
        match self {
            Self::Session(session) => Ok(ConsentOutcome::Session(Box::new(session.clone()))),
            Self::Abort => Ok(ConsentOutcome::Abort(found(
                "https://consent.example/auth/consent?consent_challenge=test",
            ))),
            Self::Fail => Err(ConsentError::SessionNotFound),
        }
    }
}

/// A signing key strategy that always fails.
pub(crate) struct FailingKeys;

#[async_trait]
impl SigningKeyStrategy for FailingKeys {
    async fn current_key_id(&self) -> Result<String, KeyError> {
        Err(KeyError::NoSigningKey("id-token".to_string()))
    }
}

/// A response engine recording every issued session on top of the shipped
/// engine.
pub(crate) struct CapturingEngine {
    inner: CodeEngine,
    issued: Mutex<Vec<OidcSession>>,
}

impl CapturingEngine {
    pub(crate) fn new(clients: Arc<ClientStore>) -> Self {
        Self {
            inner: CodeEngine::new(clients),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Everything issued so far, in order.
    pub(crate) fn issued(&self) -> Vec<OidcSession> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseEngine for CapturingEngine {
    fn parse(&self, params: AuthorizeParams) -> Result<AuthorizeRequest, ProtocolError> {
        self.inner.parse(params)
    }

    async fn issue(
        &self,
        request: &AuthorizeRequest,
        session: &OidcSession,
    ) -> Result<AuthorizeResponse, EngineError> {
        self.issued.lock().unwrap().push(session.clone());
        self.inner.issue(request, session).await
    }
}

/// Application state with in-process collaborator doubles.
pub(crate) fn create_test_state(
    config: IdpConfig,
    consent: TestConsent,
    policies: Vec<Policy>,
) -> AppState {
    create_test_state_with_engine(config, consent, policies).0
}

/// Like [`create_test_state`], also handing out the capturing engine.
pub(crate) fn create_test_state_with_engine(
    config: IdpConfig,
    consent: TestConsent,
    policies: Vec<Policy>,
) -> (AppState, Arc<CapturingEngine>) {
    let clients = Arc::new(test_clients());
    let engine = Arc::new(CapturingEngine::new(clients.clone()));
    let state = AppState {
        authenticator: Arc::new(ApiKeyAuthenticator::new(
            config.api_key.clone(),
            config.admin_subject.clone(),
        )),
        consent: Arc::new(consent),
        id_token_keys: Arc::new(StaticKeyStrategy::new("id-token-key-1")),
        access_token_keys: Arc::new(StaticKeyStrategy::new("access-token-key-1")),
        engine: engine.clone(),
        policies: Arc::new(policies),
        clients,
        config: Arc::new(config),
    };
    (state, engine)
}

/// The policy set granting the admin subject access to the token surface.
pub(crate) fn admin_policies() -> Vec<Policy> {
    vec![Policy::new(
        Effect::Allow,
        vec!["admin".to_string()],
        vec![crate::api::TOKENS_RESOURCE.to_string()],
        vec![crate::api::TOKENS_ACTION.to_string()],
    )]
}

/// Test fixture assembling the complete application with in-process
/// collaborator doubles.
pub(crate) struct TestFixture {
    pub(crate) app: Router,
}

impl TestFixture {
    pub(crate) const API_KEY: &'static str = "test-api-key";

    /// The default fixture: consent resolves to an accepted session and
    /// the admin subject may mint tokens.
    pub(crate) async fn new() -> Self {
        Self::with_consent(TestConsent::Session(test_session())).await
    }

    pub(crate) async fn with_consent(consent: TestConsent) -> Self {
        Self::build(consent, admin_policies()).await
    }

    /// A fixture whose policy set is empty, so every admin call is denied.
    pub(crate) async fn without_policies() -> Self {
        Self::build(TestConsent::Session(test_session()), Vec::new()).await
    }

    async fn build(consent: TestConsent, policies: Vec<Policy>) -> Self {
        // Initialize test logger
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let state = create_test_state(IdpConfig::for_test(), consent, policies);
        Self {
            app: create_app(state),
        }
    }

    pub(crate) async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub(crate) async fn post(
        &self,
        uri: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .expect("Failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, headers, body)
    }
}
