//! Request/response types and the handler abstraction compiled routes carry.
//!
//! A [`Handler`] is any `Fn(HandlerRequest) -> HandlerResponse` behind an
//! `Arc`, so compiled route tables can be cloned and shared across threads
//! by the dispatcher that consumes them.

use crate::spec::{Parameter, ParameterLocation};
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline path/query params before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated path/query parameter storage
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header/cookie storage
///
/// Header names use `Arc<str>`: they repeat across requests and clone in O(1).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request data passed to a handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path
    pub path: String,
    /// Name of the route (operationId) serving this request, if any
    pub route_name: Option<String>,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
    /// Query string parameters
    pub query_params: ParamVec,
    /// HTTP headers
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    /// Form fields from a urlencoded or multipart body
    pub form: ParamVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
}

impl HandlerRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        HandlerRequest {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Get a path parameter by name
    ///
    /// Last write wins when a name repeats.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    ///
    /// Last write wins when a name repeats (`?limit=10&limit=20`).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_form_field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Raw value for a declared parameter, as the validator sees it.
    ///
    /// Scalars arrive as JSON strings; the body arrives as parsed JSON.
    #[must_use]
    pub fn parameter_value(&self, parameter: &Parameter) -> Option<Value> {
        let name = parameter.name.as_str();
        let raw = match parameter.location {
            ParameterLocation::Body => return self.body.clone(),
            ParameterLocation::Path => self.get_path_param(name),
            ParameterLocation::Query => self.get_query_param(name),
            ParameterLocation::Header => self.get_header(name),
            ParameterLocation::FormData => self.get_form_field(name),
        };
        raw.map(|v| Value::String(v.to_string()))
    }
}

/// Response data produced by a handler.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Anything that can serve a compiled route.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, req: HandlerRequest) -> HandlerResponse;
}

impl<F> RequestHandler for F
where
    F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync,
{
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        self(req)
    }
}

/// Shared, invocable handler.
pub type Handler = Arc<dyn RequestHandler>;

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity comparison for shared callables. Only the data pointer is
/// compared; vtable addresses are not stable across codegen units.
pub(crate) fn same_callable<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Render a param vector as a JSON object.
pub(crate) fn params_to_json(params: &[(Arc<str>, String)]) -> Value {
    let mut map = Map::new();
    for (k, v) in params {
        map.insert(k.to_string(), Value::String(v.clone()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_value_by_location() {
        let mut req = HandlerRequest::new(Method::POST, "/pets/7");
        req.path_params.push((Arc::from("id"), "7".into()));
        req.query_params.push((Arc::from("limit"), "10".into()));
        req.query_params.push((Arc::from("limit"), "20".into()));
        req.headers.push((Arc::from("X-Trace"), "abc".into()));
        req.form.push((Arc::from("tag"), "good".into()));
        req.body = Some(json!({ "name": "Rex" }));

        let id = Parameter::new(ParameterLocation::Path, "id");
        let limit = Parameter::new(ParameterLocation::Query, "limit");
        let trace = Parameter::new(ParameterLocation::Header, "x-trace");
        let body = Parameter::new(ParameterLocation::Body, "pet");
        let tag = Parameter::new(ParameterLocation::FormData, "tag");
        let missing = Parameter::new(ParameterLocation::FormData, "file");

        assert_eq!(req.parameter_value(&id), Some(json!("7")));
        assert_eq!(req.parameter_value(&limit), Some(json!("20")));
        assert_eq!(req.parameter_value(&trace), Some(json!("abc")));
        assert_eq!(req.parameter_value(&body), Some(json!({ "name": "Rex" })));
        assert_eq!(req.parameter_value(&tag), Some(json!("good")));
        assert_eq!(req.parameter_value(&missing), None);
    }

    #[test]
    fn test_handler_fn_and_identity() {
        let h = handler_fn(|req| HandlerResponse::json(200, json!({ "path": req.path })));
        let same = Arc::clone(&h);
        let other = handler_fn(|_req| HandlerResponse::error(500, "boom"));

        assert!(same_callable(&h, &same));
        assert!(!same_callable(&h, &other));

        let resp = h.handle(HandlerRequest::new(Method::GET, "/x"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, json!({ "path": "/x" }));
        assert_eq!(resp.get_header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut resp = HandlerResponse::json(200, json!(null));
        resp.set_header("Content-Type", "text/plain".into());
        assert_eq!(resp.get_header("content-type"), Some("text/plain"));
        assert_eq!(resp.headers.len(), 1);
    }
}
