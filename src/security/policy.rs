use super::{Authorizer, SecurityProvider, SecurityRequest};
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLocation {
    Header,
    Query,
    Cookie,
}

/// A declarative authorizer, as read from a module file.
///
/// ```yaml
/// kind: api_key
/// in: header
/// name: X-API-Key
/// keys: [test123]
/// ```
///
/// ```yaml
/// kind: bearer
/// tokens:
///   admin-token: [read, write]
///   reader-token: [read]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyManifest {
    ApiKey {
        #[serde(rename = "in")]
        location: KeyLocation,
        name: String,
        keys: Vec<String>,
    },
    Bearer {
        tokens: IndexMap<String, Vec<String>>,
    },
}

impl PolicyManifest {
    #[must_use]
    pub fn into_authorizer(self) -> Authorizer {
        match self {
            PolicyManifest::ApiKey {
                location,
                name,
                keys,
            } => Arc::new(ApiKeyPolicy::new(location, name, keys)),
            PolicyManifest::Bearer { tokens } => Arc::new(BearerPolicy::new(tokens)),
        }
    }
}

/// Accepts requests carrying one of a fixed set of API keys.
#[derive(Debug, Clone)]
pub struct ApiKeyPolicy {
    location: KeyLocation,
    name: String,
    keys: Vec<String>,
}

impl ApiKeyPolicy {
    pub fn new(location: KeyLocation, name: impl Into<String>, keys: Vec<String>) -> Self {
        ApiKeyPolicy {
            location,
            name: name.into(),
            keys,
        }
    }

    fn extract<'a>(&self, req: &'a SecurityRequest<'_>) -> Option<&'a str> {
        match self.location {
            KeyLocation::Header => req.get_header(&self.name),
            KeyLocation::Query => req.get_query(&self.name),
            KeyLocation::Cookie => req.get_cookie(&self.name),
        }
    }
}

impl SecurityProvider for ApiKeyPolicy {
    /// API keys carry no scopes; any required scopes are ignored.
    fn validate(&self, scheme: &str, _scopes: &[String], req: &SecurityRequest<'_>) -> bool {
        let Some(key) = self.extract(req) else {
            debug!(scheme, name = %self.name, "API key validation failed: missing key");
            return false;
        };
        let ok = self.keys.iter().any(|k| k == key);
        if !ok {
            debug!(scheme, name = %self.name, "API key validation failed: unknown key");
        }
        ok
    }
}

/// Accepts `Authorization: Bearer {token}` for known tokens holding every
/// required scope.
#[derive(Debug, Clone)]
pub struct BearerPolicy {
    tokens: IndexMap<String, Vec<String>>,
}

impl BearerPolicy {
    #[must_use]
    pub fn new(tokens: IndexMap<String, Vec<String>>) -> Self {
        BearerPolicy { tokens }
    }

    fn extract<'a>(req: &'a SecurityRequest<'_>) -> Option<&'a str> {
        let header = req.get_header("authorization")?;
        let (prefix, token) = header.split_once(' ')?;
        prefix
            .eq_ignore_ascii_case("bearer")
            .then_some(token.trim())
    }
}

impl SecurityProvider for BearerPolicy {
    fn validate(&self, scheme: &str, scopes: &[String], req: &SecurityRequest<'_>) -> bool {
        let Some(token) = Self::extract(req) else {
            debug!(scheme, "Bearer validation failed: missing token");
            return false;
        };
        let Some(granted) = self.tokens.get(token) else {
            debug!(scheme, "Bearer validation failed: unknown token");
            return false;
        };
        let has_all_scopes = scopes.iter().all(|s| granted.contains(s));
        if !has_all_scopes {
            debug!(
                scheme,
                granted = ?granted,
                required = ?scopes,
                "Bearer validation failed: missing required scopes"
            );
        }
        has_all_scopes
    }
}
