use crate::Policy;
use std::collections::HashMap;
use std::fmt;

/// An authenticated caller identity, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject(String);

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A presented proof of identity, e.g. a validated bearer token.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    /// Whether the credential passed verification
    pub valid: bool,
    /// Claims carried by the credential
    pub claims: HashMap<String, serde_json::Value>,
}

impl Credential {
    /// A credential that passed verification, without claims.
    pub fn valid() -> Self {
        Self {
            valid: true,
            claims: HashMap::new(),
        }
    }

    /// A credential that failed verification.
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Per-request authentication and authorization state.
///
/// Built exactly once when a request enters the server and read-only
/// afterwards. The context is owned by the request's execution and must
/// never be shared across requests or cached.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    subject: Option<Subject>,
    credential: Option<Credential>,
    policies: Vec<Policy>,
}

impl RequestContext {
    pub fn new(
        subject: Option<Subject>,
        credential: Option<Credential>,
        policies: Vec<Policy>,
    ) -> Self {
        Self {
            subject,
            credential,
            policies,
        }
    }

    /// A context carrying no identity and no policies.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The policy set applicable to this request. An absent set was
    /// normalized to empty at construction; both deny by default.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// True when the request carries both a subject and a credential that
    /// passed verification.
    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some() && self.credential.as_ref().is_some_and(|c| c.valid)
    }
}
