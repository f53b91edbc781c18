use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// A registered OAuth 2.0 client.
///
/// Redirect URIs and scope defaults for synthesized authorization requests
/// come from here, never from literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: String,
    /// Redirect URIs registered for this client
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Client {
    /// The redirect URI used when a request does not name one.
    pub fn default_redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }

    pub fn is_redirect_uri_registered(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }
}

/// Errors that can occur when loading client registrations from disk
#[derive(Debug, Error)]
pub enum ClientStoreError {
    #[error("failed to read client file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse client file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory registry of OAuth 2.0 clients, loaded once at startup.
///
/// Client registration storage proper is an external subsystem; this store
/// stands in for it behind a plain lookup.
#[derive(Debug, Clone, Default)]
pub struct ClientStore {
    clients: HashMap<String, Client>,
}

impl ClientStore {
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|client| (client.id.clone(), client))
                .collect(),
        }
    }

    /// Load client registrations from a JSON file containing an array of
    /// clients.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientStoreError> {
        let raw = std::fs::read(path)?;
        let clients: Vec<Client> = serde_json::from_slice(&raw)?;
        Ok(Self::new(clients))
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }
}
