use crate::api::context::{ApiKeyAuthenticator, Authenticator};
use crate::clients::ClientStore;
use crate::config::IdpConfig;
use crate::oauth2::consent::{ConsentStrategy, HttpConsentStrategy};
use crate::oauth2::engine::{CodeEngine, ResponseEngine};
use crate::oauth2::keys::{JwksKeyStrategy, SigningKeyStrategy};
use idp_policy::Policy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
///
/// Everything in here is immutable once constructed. Per-request state
/// (the request context, the authorize request, the consent session) lives
/// with the request's execution and never in this struct.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdpConfig>,
    pub policies: Arc<Vec<Policy>>,
    pub clients: Arc<ClientStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub consent: Arc<dyn ConsentStrategy>,
    pub id_token_keys: Arc<dyn SigningKeyStrategy>,
    pub access_token_keys: Arc<dyn SigningKeyStrategy>,
    pub engine: Arc<dyn ResponseEngine>,
}

impl AppState {
    /// Create a client for one of the upstream collaborators.
    ///
    /// The request deadline bounds every call this core makes; no retries
    /// or internal timeouts are layered on top.
    fn create_upstream_client(timeout: u64) -> reqwest::Client {
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(2))
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .expect("Failed to create upstream HTTP client")
    }

    pub fn new(config: IdpConfig) -> Result<Self, std::io::Error> {
        let policies = config.load_policy_set().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to load policy set: {}", e),
            )
        })?;
        let clients = Arc::new(config.load_client_store().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to load client registrations: {}", e),
            )
        })?);

        let consent_client = Self::create_upstream_client(config.consent.query_timeout);
        let keystore_client = Self::create_upstream_client(config.keystore.query_timeout);

        Ok(Self {
            authenticator: Arc::new(ApiKeyAuthenticator::new(
                config.api_key.clone(),
                config.admin_subject.clone(),
            )),
            consent: Arc::new(HttpConsentStrategy::new(
                consent_client,
                config.consent.url.clone(),
            )),
            id_token_keys: Arc::new(JwksKeyStrategy::new(
                keystore_client.clone(),
                config.keystore.url.clone(),
                config.keystore.id_token_set.clone(),
            )),
            access_token_keys: Arc::new(JwksKeyStrategy::new(
                keystore_client,
                config.keystore.url.clone(),
                config.keystore.access_token_set.clone(),
            )),
            engine: Arc::new(CodeEngine::new(clients.clone())),
            policies: Arc::new(policies),
            clients,
            config: Arc::new(config),
        })
    }
}
