use crate::handler::{same_callable, Handler, HandlerRequest, HandlerResponse, RequestHandler};
use crate::security::{flatten_requirements, SecurityMap, SecurityRequest};
use crate::validator::{ParameterValidator, ValidationIssue};
use http::Method;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// A route before validators and a handler are attached.
///
/// This is what the validator aggregator sees.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDraft {
    pub path: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub method: Method,
    pub security: Option<SecurityMap>,
    /// Requirement objects behind `security`, as declared.
    pub requirements: Vec<SecurityMap>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub json: Option<bool>,
    pub cache: Option<Value>,
    pub config: Option<Value>,
    pub jsonp: Option<String>,
}

impl RouteDraft {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        RouteDraft {
            path: path.into(),
            name: None,
            description: None,
            method,
            security: None,
            requirements: Vec::new(),
            consumes: None,
            produces: None,
            json: None,
            cache: None,
            config: None,
            jsonp: None,
        }
    }

    /// Set the compiled requirement objects and the flat `security` map
    /// derived from them.
    pub fn set_security(&mut self, requirements: Option<Vec<SecurityMap>>) {
        self.security = requirements.as_deref().map(flatten_requirements);
        self.requirements = requirements.unwrap_or_default();
    }

    #[must_use]
    pub fn assemble(self, validators: Vec<ParameterValidator>, handler: Handler) -> RouteDescriptor {
        RouteDescriptor {
            path: self.path,
            name: self.name,
            description: self.description,
            method: self.method,
            security: self.security,
            requirements: self.requirements,
            validators,
            consumes: self.consumes,
            produces: self.produces,
            json: self.json,
            cache: self.cache,
            config: self.config,
            jsonp: self.jsonp,
            handler,
        }
    }
}

/// One compiled, dispatch-ready (path, verb) endpoint.
#[derive(Clone)]
pub struct RouteDescriptor {
    /// Route path, `basePath` included when prepended.
    pub path: String,
    /// `operationId`
    pub name: Option<String>,
    pub description: Option<String>,
    pub method: Method,
    /// Every scheme the route names, requirement objects merged.
    pub security: Option<SecurityMap>,
    /// Requirement objects as declared: schemes within one are all required,
    /// the objects are alternatives.
    pub requirements: Vec<SecurityMap>,
    /// One validator per merged parameter, in merge order.
    pub validators: Vec<ParameterValidator>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub json: Option<bool>,
    pub cache: Option<Value>,
    pub config: Option<Value>,
    pub jsonp: Option<String>,
    pub handler: Handler,
}

/// Values that passed validation, keyed by parameter name.
pub type ValidatedParams = IndexMap<String, Value>;

impl RouteDescriptor {
    /// Check credentials against the compiled requirement objects.
    ///
    /// The request passes when some requirement object accepts it, and an
    /// object accepts when every scheme in it with an authorizer accepts.
    /// Schemes without an authorizer are not checked here. A route without
    /// security, or with `security: []`, passes.
    #[must_use]
    pub fn authorize(&self, req: &SecurityRequest<'_>) -> bool {
        if self.security.is_none() || self.requirements.is_empty() {
            return true;
        }
        self.requirements.iter().any(|group| {
            group
                .iter()
                .all(|(scheme, entry)| entry.check(scheme, req).unwrap_or(true))
        })
    }

    /// Run every validator against the request.
    ///
    /// # Errors
    ///
    /// All issues found, in validator order.
    pub fn validate(&self, req: &HandlerRequest) -> Result<ValidatedParams, Vec<ValidationIssue>> {
        let mut values = ValidatedParams::new();
        let mut issues = Vec::new();
        for validator in &self.validators {
            let raw = req.parameter_value(&validator.parameter);
            match validator.validate(raw.as_ref()) {
                Ok(Some(value)) => {
                    values.insert(validator.parameter.name.clone(), value);
                }
                Ok(None) => {}
                Err(issue) => issues.push(issue),
            }
        }
        if issues.is_empty() {
            Ok(values)
        } else {
            Err(issues)
        }
    }

    /// Invoke the handler, tagging the request with this route's name.
    pub fn handle(&self, mut req: HandlerRequest) -> HandlerResponse {
        if req.route_name.is_none() {
            req.route_name.clone_from(&self.name);
        }
        self.handler.handle(req)
    }

    /// Serializable view used by the CLI.
    #[must_use]
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            method: self.method.to_string(),
            path: self.path.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self
                .validators
                .iter()
                .map(|v| v.parameter.label())
                .collect(),
            security: self.security.as_ref().map(|map| {
                map.iter()
                    .map(|(scheme, entry)| {
                        (
                            scheme.clone(),
                            SchemeSummary {
                                scopes: entry.scopes.clone(),
                                authorize: entry.authorize.is_some(),
                            },
                        )
                    })
                    .collect()
            }),
            consumes: self.consumes.clone(),
            produces: self.produces.clone(),
        }
    }
}

impl PartialEq for RouteDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.name == other.name
            && self.description == other.description
            && self.method == other.method
            && self.security == other.security
            && self.requirements == other.requirements
            && self.validators == other.validators
            && self.consumes == other.consumes
            && self.produces == other.produces
            && self.json == other.json
            && self.cache == other.cache
            && self.config == other.config
            && self.jsonp == other.jsonp
            && same_callable(&self.handler, &other.handler)
    }
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("security", &self.security)
            .field("validators", &self.validators)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeSummary {
    pub scopes: Vec<String>,
    pub authorize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<IndexMap<String, SchemeSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<String>>,
}
