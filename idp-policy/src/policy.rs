use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// The effect a policy has once it applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// A single access-control rule.
///
/// A policy applies to a `(subject, resource, action)` triple when the
/// subject, resource and action are each members of the corresponding set,
/// as decided by the configured [`Matcher`](crate::Matcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Identifier of the policy, informational only
    #[serde(default)]
    pub id: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Whether a match allows or denies the request
    pub effect: Effect,
    /// Subjects this policy applies to
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Resources this policy applies to
    #[serde(default)]
    pub resources: Vec<String>,
    /// Actions this policy applies to
    #[serde(default)]
    pub actions: Vec<String>,
}

impl Policy {
    /// Create a policy without id or description.
    pub fn new(
        effect: Effect,
        subjects: Vec<String>,
        resources: Vec<String>,
        actions: Vec<String>,
    ) -> Self {
        Self {
            id: String::new(),
            description: String::new(),
            effect,
            subjects,
            resources,
            actions,
        }
    }
}

/// Errors that can occur when loading a policy set from disk
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load a policy set from a JSON file containing an array of policies.
pub fn load_policies(path: impl AsRef<Path>) -> Result<Vec<Policy>, PolicyError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}
