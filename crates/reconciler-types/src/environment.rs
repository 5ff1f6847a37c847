use serde::{Deserialize, Serialize};

/// A value that is either authored literally or indirected through an
/// environment variable (`spec.md` §3 "Environment": "`url` may be literal or
/// indirected through an env-var reference").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Indirected {
    Value { value: String },
    Environment { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectionError {
    pub variable: String,
}

impl std::fmt::Display for IndirectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "environment variable {} is not set", self.variable)
    }
}

impl std::error::Error for IndirectionError {}

impl Indirected {
    pub fn resolve(&self) -> Result<String, IndirectionError> {
        match self {
            Indirected::Value { value } => Ok(value.clone()),
            Indirected::Environment { name } => {
                std::env::var(name).map_err(|_| IndirectionError { variable: name.clone() })
            }
        }
    }
}

/// Authentication for a single environment: either a bare bearer token or
/// OAuth client-credentials. Both the token transport itself and the OAuth
/// exchange are out of scope (`spec.md` §1) — this type carries only enough to
/// decide whether a kind is allowed to target this environment and to hand
/// credentials to the (external) credentialed transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    Token { token: Indirected },
    OAuth {
        client_id: Indirected,
        client_secret: Indirected,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_endpoint: Option<String>,
    },
}

impl Auth {
    /// True when this environment authenticates with a classic bearer token
    /// only, i.e. it cannot serve platform-only (automation/bucket) kinds
    /// (invariant 4 in `spec.md` §3).
    pub fn is_classic_token_only(&self) -> bool {
        matches!(self, Auth::Token { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub url: Indirected,
    pub auth: Auth,
}

impl Environment {
    pub fn new(name: impl Into<String>, url: Indirected, auth: Auth) -> Self {
        Self {
            name: name.into(),
            group: None,
            url,
            auth,
        }
    }

    pub fn resolved_url(&self) -> Result<String, IndirectionError> {
        self.url.resolve()
    }
}
