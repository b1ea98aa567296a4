//! # Security Module
//!
//! Compiles the `security` requirements of each route against the global
//! `securityDefinitions` and resolves an authorizer for every referenced
//! scheme.
//!
//! ## Overview
//!
//! For a route, [`SecurityCompiler::build`] produces a [`SecurityMap`]:
//! scheme name → [`SecurityEntry`] holding the required scopes and, when one
//! could be resolved, an [`Authorizer`].
//!
//! Referencing an unknown scheme, or a scope the scheme does not declare, is
//! a compilation-fatal [`crate::CompileError`].
//!
//! ## Authorizer precedence
//!
//! 1. `x-authorize` on the scheme definition
//! 2. `{security_root}/{scheme}` when a security root is configured
//!
//! A declared `x-authorize` is the only source for its scheme: if it does not
//! resolve, the scheme has no authorizer and the security root is not
//! consulted. A scheme with no authorizer keeps its scopes; enforcing it is
//! left to the dispatcher.
//!
//! ## Requirement objects
//!
//! [`SecurityCompiler::requirements`] keeps one [`SecurityMap`] per
//! requirement object. Schemes inside an object are all required and the
//! objects are alternatives. [`SecurityCompiler::build`] gives the flat view.
//!
//! ## Authorizers
//!
//! An authorizer is any [`SecurityProvider`]. Closures work too:
//!
//! ```rust
//! use brrtroutes::security::{authorizer_fn, SecurityRequest};
//!
//! let api_key = authorizer_fn(|_scheme: &str, _scopes: &[String], req: &SecurityRequest<'_>| {
//!     req.get_header("x-api-key") == Some("test123")
//! });
//! ```
//!
//! Declarative policies loaded by [`crate::resolve::ManifestLoader`] are
//! described by [`PolicyManifest`].

use crate::handler::{same_callable, HandlerRequest, HeaderVec, ParamVec};
use indexmap::IndexMap;
use std::sync::Arc;

mod build;
mod policy;

pub use build::SecurityCompiler;
pub use policy::{ApiKeyPolicy, BearerPolicy, KeyLocation, PolicyManifest};

/// Request context for security validation.
///
/// Borrows the credentials carried by a request (headers, query, cookies).
pub struct SecurityRequest<'a> {
    pub headers: &'a HeaderVec,
    pub query: &'a ParamVec,
    pub cookies: &'a HeaderVec,
}

impl<'a> SecurityRequest<'a> {
    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

impl<'a> From<&'a HandlerRequest> for SecurityRequest<'a> {
    fn from(req: &'a HandlerRequest) -> Self {
        SecurityRequest {
            headers: &req.headers,
            query: &req.query_params,
            cookies: &req.cookies,
        }
    }
}

/// Validates a request against one security scheme.
pub trait SecurityProvider: Send + Sync {
    /// # Arguments
    ///
    /// * `scheme` - Name of the security scheme being checked
    /// * `scopes` - Scopes the route requires under that scheme
    /// * `req` - Credentials carried by the request
    ///
    /// # Returns
    ///
    /// `true` if the request is authenticated and authorized
    fn validate(&self, scheme: &str, scopes: &[String], req: &SecurityRequest<'_>) -> bool;
}

impl<F> SecurityProvider for F
where
    F: Fn(&str, &[String], &SecurityRequest<'_>) -> bool + Send + Sync,
{
    fn validate(&self, scheme: &str, scopes: &[String], req: &SecurityRequest<'_>) -> bool {
        self(scheme, scopes, req)
    }
}

/// Shared authorization callable.
pub type Authorizer = Arc<dyn SecurityProvider>;

/// Wrap a closure as an [`Authorizer`].
pub fn authorizer_fn<F>(f: F) -> Authorizer
where
    F: Fn(&str, &[String], &SecurityRequest<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Compiled requirement for one scheme on one route.
#[derive(Clone)]
pub struct SecurityEntry {
    /// Scopes the route requires, in declaration order
    pub scopes: Vec<String>,
    /// Resolved authorizer, if any
    pub authorize: Option<Authorizer>,
}

impl SecurityEntry {
    /// Run the authorizer. `None` when the scheme has no authorizer.
    #[must_use]
    pub fn check(&self, scheme: &str, req: &SecurityRequest<'_>) -> Option<bool> {
        self.authorize
            .as_ref()
            .map(|provider| provider.validate(scheme, &self.scopes, req))
    }
}

impl std::fmt::Debug for SecurityEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityEntry")
            .field("scopes", &self.scopes)
            .field("authorize", &self.authorize.is_some())
            .finish()
    }
}

impl PartialEq for SecurityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.scopes == other.scopes
            && match (&self.authorize, &other.authorize) {
                (Some(a), Some(b)) => same_callable(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Scheme name → compiled requirement, in declaration order.
pub type SecurityMap = IndexMap<String, SecurityEntry>;

/// Merge requirement objects into one map. A scheme named twice keeps its
/// first position and the last scopes given.
#[must_use]
pub fn flatten_requirements(requirements: &[SecurityMap]) -> SecurityMap {
    let mut flat = SecurityMap::new();
    for group in requirements {
        for (scheme, entry) in group {
            flat.insert(scheme.clone(), entry.clone());
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_security_request_from_handler_request() {
        let mut req = HandlerRequest::new(Method::GET, "/pets");
        req.headers.push((Arc::from("X-API-Key"), "k1".into()));
        req.query_params.push((Arc::from("token"), "t1".into()));
        req.cookies.push((Arc::from("session"), "s1".into()));

        let sreq = SecurityRequest::from(&req);
        assert_eq!(sreq.get_header("x-api-key"), Some("k1"));
        assert_eq!(sreq.get_query("token"), Some("t1"));
        assert_eq!(sreq.get_cookie("session"), Some("s1"));
        assert_eq!(sreq.get_cookie("missing"), None);
    }

    #[test]
    fn test_entry_check_and_equality() {
        let allow = authorizer_fn(|_s: &str, scopes: &[String], _r: &SecurityRequest<'_>| {
            scopes.iter().all(|s| s == "read")
        });
        let entry = SecurityEntry {
            scopes: vec!["read".into()],
            authorize: Some(Arc::clone(&allow)),
        };
        let req = HandlerRequest::default();
        assert_eq!(entry.check("oauth2", &SecurityRequest::from(&req)), Some(true));

        let same = SecurityEntry {
            scopes: vec!["read".into()],
            authorize: Some(allow),
        };
        let bare = SecurityEntry {
            scopes: vec!["read".into()],
            authorize: None,
        };
        assert_eq!(entry, same);
        assert_ne!(entry, bare);
        assert_eq!(bare.check("oauth2", &SecurityRequest::from(&req)), None);
    }
}
