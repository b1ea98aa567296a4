use crate::handler::Handler;
use crate::resolve::Reference;
use crate::security::Authorizer;
use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verbs recognised under a path item, in the order they are compiled.
pub static VERBS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::PATCH,
];

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl ParameterLocation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Body => "body",
            ParameterLocation::FormData => "formData",
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared operation parameter.
///
/// Non-body parameters carry their schema inline (`type`, `format`, `items`,
/// `enum`, ...); body parameters carry it under `schema`. Remaining keywords
/// such as `minimum` or `pattern` land in `constraints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(flatten)]
    pub constraints: IndexMap<String, Value>,
}

impl Parameter {
    /// Minimal parameter with no type information.
    pub fn new(location: ParameterLocation, name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            location,
            description: None,
            required: false,
            schema: None,
            kind: None,
            format: None,
            items: None,
            collection_format: None,
            allowed: None,
            default: None,
            constraints: IndexMap::new(),
        }
    }

    /// `"{in}:{name}"`, used in logs and validation issues.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.location, self.name)
    }
}

/// One security requirement object: scheme name → requested scopes.
///
/// Scopes are kept as raw values so that non-string entries are reported as
/// unknown scopes instead of failing the whole document.
pub type SecurityRequirement = IndexMap<String, Vec<Value>>;

/// A declared `security` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SecurityDecl {
    /// An ordered list of requirement objects.
    Requirements(Vec<SecurityRequirement>),
    /// Anything else. Treated as "no requirement" by the security compiler.
    Malformed(Value),
}

impl SecurityDecl {
    #[must_use]
    pub fn requirements(&self) -> Option<&[SecurityRequirement]> {
        match self {
            SecurityDecl::Requirements(reqs) => Some(reqs),
            SecurityDecl::Malformed(_) => None,
        }
    }
}

impl From<Vec<SecurityRequirement>> for SecurityDecl {
    fn from(reqs: Vec<SecurityRequirement>) -> Self {
        SecurityDecl::Requirements(reqs)
    }
}

/// A globally declared security scheme (`securityDefinitions.<name>`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySchemeDef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "in", default)]
    pub location: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    /// Valid scope identifiers mapped to their descriptions.
    #[serde(default)]
    pub scopes: IndexMap<String, String>,
    /// Explicit authorizer module, overriding the security-root convention.
    #[serde(rename = "x-authorize", default)]
    pub authorize: Option<Reference<Authorizer>>,
}

impl SecuritySchemeDef {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }
}

/// A single verb-scoped endpoint definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub consumes: Option<Vec<String>>,
    #[serde(default)]
    pub produces: Option<Vec<String>>,
    #[serde(default)]
    pub json: Option<bool>,
    #[serde(default)]
    pub cache: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub jsonp: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub security: Option<SecurityDecl>,
    /// Explicit handler module (`x-handler`).
    #[serde(rename = "x-handler", default)]
    pub handler: Option<Reference<Handler>>,
}

/// Everything declared under one path template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,
    #[serde(default)]
    pub head: Option<Operation>,
    #[serde(default)]
    pub options: Option<Operation>,
    #[serde(default)]
    pub patch: Option<Operation>,
    /// Parameters shared by every operation under this path.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Path-level security, used when an operation declares none.
    #[serde(default)]
    pub security: Option<SecurityDecl>,
}

impl PathItem {
    #[must_use]
    pub fn operation(&self, method: &Method) -> Option<&Operation> {
        match *method {
            Method::GET => self.get.as_ref(),
            Method::POST => self.post.as_ref(),
            Method::PUT => self.put.as_ref(),
            Method::DELETE => self.delete.as_ref(),
            Method::HEAD => self.head.as_ref(),
            Method::OPTIONS => self.options.as_ref(),
            Method::PATCH => self.patch.as_ref(),
            _ => None,
        }
    }

    /// Declared operations in [`VERBS`] order.
    pub fn operations(&self) -> impl Iterator<Item = (Method, &Operation)> + '_ {
        VERBS
            .iter()
            .filter_map(move |m| self.operation(m).map(|op| (m.clone(), op)))
    }
}

/// A Swagger 2.0 style API description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDescription {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub consumes: Option<Vec<String>>,
    #[serde(default)]
    pub produces: Option<Vec<String>>,
    #[serde(default)]
    pub json: Option<bool>,
    #[serde(default)]
    pub cache: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub jsonp: Option<String>,
    #[serde(default)]
    pub security: Option<SecurityDecl>,
    #[serde(default)]
    pub security_definitions: Option<IndexMap<String, SecuritySchemeDef>>,
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
}

impl ApiDescription {
    /// Number of declared (path, verb) pairs.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|item| item.operations().count()).sum()
    }
}
