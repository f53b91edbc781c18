use crate::clients::{ClientStore, ClientStoreError};
use config::{Config as ConfigCrate, ConfigError};
use idp_policy::{load_policies, Policy, PolicyError};
use serde::Deserialize;

/// How the protocol response engine mints access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessTokenStrategy {
    /// Opaque tokens; no signing key is involved
    #[default]
    Opaque,
    /// Signed JWT access tokens; each token is labeled with a key id
    Jwt,
}

/// Consent service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentConfig {
    /// Base URL of the consent service
    #[serde(default = "default_consent_url")]
    pub url: String,
    /// Request timeout towards the consent service, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub query_timeout: u64,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            url: default_consent_url(),
            query_timeout: default_upstream_timeout(),
        }
    }
}

/// Key store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KeystoreConfig {
    /// Base URL of the key store serving JWK sets
    #[serde(default = "default_keystore_url")]
    pub url: String,
    /// Request timeout towards the key store, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub query_timeout: u64,
    /// Name of the key set holding the ID token signing keys
    #[serde(default = "default_id_token_set")]
    pub id_token_set: String,
    /// Name of the key set holding the access token signing keys
    #[serde(default = "default_access_token_set")]
    pub access_token_set: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            url: default_keystore_url(),
            query_timeout: default_upstream_timeout(),
            id_token_set: default_id_token_set(),
            access_token_set: default_access_token_set(),
        }
    }
}

/// Main configuration structure for the identity provider server
#[derive(Debug, Deserialize, Clone)]
pub struct IdpConfig {
    /// API key for the admin surface - mandatory for all admin calls
    #[serde(default)]
    pub api_key: String,

    /// Subject the admin API key authenticates as
    #[serde(default = "default_admin_subject")]
    pub admin_subject: String,

    /// Issuer URL stamped into identity token claims
    #[serde(default = "default_issuer_url")]
    pub issuer_url: String,

    /// Whether outgoing error responses may carry internal debug detail.
    /// Off by default.
    #[serde(default)]
    pub share_debug: bool,

    /// Trusted error page used when a request's redirect URI cannot be
    /// trusted. When unset such errors are written directly to the caller.
    #[serde(default)]
    pub error_url: Option<String>,

    /// Access token strategy (default: opaque)
    #[serde(default)]
    pub access_token_strategy: AccessTokenStrategy,

    /// The port the server will listen to (default: 4444)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to a JSON file with the access-control policy set
    #[serde(default)]
    pub policies_file: Option<String>,

    /// Path to a JSON file with the registered OAuth 2.0 clients
    #[serde(default)]
    pub clients_file: Option<String>,

    /// Consent service configuration
    #[serde(default)]
    pub consent: ConsentConfig,

    /// Key store configuration
    #[serde(default)]
    pub keystore: KeystoreConfig,
}

fn default_admin_subject() -> String {
    "admin".to_string()
}

fn default_issuer_url() -> String {
    "https://localhost:4444".to_string()
}

fn default_port() -> u16 {
    4444
}

fn default_consent_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_keystore_url() -> String {
    "http://localhost:4445".to_string()
}

fn default_id_token_set() -> String {
    "id-token".to_string()
}

fn default_access_token_set() -> String {
    "access-token".to_string()
}

fn default_upstream_timeout() -> u64 {
    5
}

impl IdpConfig {
    /// Creates a new config instance from environment variables
    pub fn new() -> Result<Self, String> {
        ConfigCrate::builder()
            .add_source(
                config::Environment::with_prefix("IDP")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    /// Load the policy set named by `policies_file`, empty when unset.
    pub fn load_policy_set(&self) -> Result<Vec<Policy>, PolicyError> {
        match &self.policies_file {
            Some(path) => load_policies(path),
            None => Ok(Vec::new()),
        }
    }

    /// Load the client registrations named by `clients_file`, empty when
    /// unset.
    pub fn load_client_store(&self) -> Result<ClientStore, ClientStoreError> {
        match &self.clients_file {
            Some(path) => ClientStore::from_file(path),
            None => Ok(ClientStore::default()),
        }
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            api_key: "test-api-key".to_string(),
            admin_subject: "admin".to_string(),
            issuer_url: "https://idp.example".to_string(),
            share_debug: false,
            error_url: None,
            access_token_strategy: AccessTokenStrategy::Opaque,
            port: 0, // Let the OS choose a port
            policies_file: None,
            clients_file: None,
            consent: ConsentConfig::default(),
            keystore: KeystoreConfig::default(),
        }
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(
        consent_mock: &wiremock::MockServer,
        keystore_mock: &wiremock::MockServer,
    ) -> Self {
        Self {
            consent: ConsentConfig {
                url: consent_mock.uri(),
                query_timeout: 5,
            },
            keystore: KeystoreConfig {
                url: keystore_mock.uri(),
                query_timeout: 5,
                ..Default::default()
            },
            ..Self::for_test()
        }
    }
}
