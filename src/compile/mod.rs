//! # Compile Module
//!
//! Walks an [`ApiDescription`] and produces the flat route table a dispatcher
//! consumes.
//!
//! ## Per route
//!
//! For every path (in declaration order) and every declared verb (in
//! [`crate::spec::VERBS`] order):
//!
//! 1. The route path is the declared path, prefixed with `basePath` according
//!    to [`BasePathMode`].
//! 2. `consumes`, `produces`, `json`, `cache`, `config` and `jsonp` come from
//!    the operation when declared there, else from the description.
//! 3. Security comes from the operation, else the path item, else the
//!    description, and is compiled by [`SecurityCompiler`].
//! 4. Path-level parameters are keyed by `(in, name)`; operation-level
//!    parameters overwrite entries with the same key. The merged map goes to
//!    the [`ValidatorFactory`].
//! 5. The handler is resolved (see below).
//! 6. A route whose handler did not resolve is dropped.
//!
//! ## Handler resolution
//!
//! An `x-handler` module path is honoured only if the module exists under the
//! handler root; it is then resolved against the base directory with the
//! route's verb. Otherwise the [`DefaultStrategy`] list is tried in order:
//! by default an exact lookup in the [`HandlerTree`], then the configured
//! default handler.
//!
//! ## Example
//!
//! ```rust
//! use brrtroutes::compile::RouteCompiler;
//! use brrtroutes::config::CompilerConfig;
//! use brrtroutes::echo::echo;
//! use brrtroutes::spec::ApiDescription;
//!
//! let api: ApiDescription = serde_json::from_value(serde_json::json!({
//!     "basePath": "/v1",
//!     "paths": { "/pets": { "get": { "operationId": "list_pets" } } }
//! })).unwrap();
//!
//! let routes = RouteCompiler::new(CompilerConfig::default())
//!     .with_default_handler(echo())
//!     .compile(&api)
//!     .unwrap();
//! assert_eq!(routes[0].path, "/v1/pets");
//! ```

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::handler::Handler;
use crate::resolve::{
    absolute, resolve, FsProbe, HandlerTree, ManifestLoader, ModuleLoader, ModuleProbe, Reference,
};
use crate::security::{Authorizer, SecurityCompiler};
use crate::spec::{ApiDescription, Operation, Parameter};
use crate::validator::{ParameterMap, SchemaValidatorFactory, ValidatorFactory};
use http::Method;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod route;

pub use crate::config::BasePathMode;
pub use route::{RouteDescriptor, RouteDraft, RouteSummary, SchemeSummary, ValidatedParams};

/// Where a route's handler comes from when no `x-handler` applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultStrategy {
    /// Exact lookup of the declared path and verb in the handler tree
    HandlerTree,
    /// The configured default handler
    DefaultHandler,
}

/// The first layer that declares a value.
fn first_declared<'a, T, const N: usize>(layers: [Option<&'a T>; N]) -> Option<&'a T> {
    layers.into_iter().flatten().next()
}

/// Key path parameters by `(in, name)`, then let operation parameters
/// overwrite. Overwritten entries keep their original position.
#[must_use]
pub fn merge_parameters(path_level: &[Parameter], operation_level: &[Parameter]) -> ParameterMap {
    let mut merged = ParameterMap::new();
    for parameter in path_level.iter().chain(operation_level) {
        merged.insert(
            (parameter.location, parameter.name.clone()),
            parameter.clone(),
        );
    }
    merged
}

/// Builds route tables from API descriptions.
///
/// Every collaborator is replaceable; the defaults read declarative modules
/// from disk and validate parameters with `jsonschema`.
pub struct RouteCompiler {
    config: CompilerConfig,
    validators: Arc<dyn ValidatorFactory>,
    handlers: Arc<dyn ModuleLoader<Handler>>,
    probe: Arc<dyn ModuleProbe>,
    authorizers: Arc<dyn ModuleLoader<Authorizer>>,
    tree: Option<HandlerTree>,
    default_handler: Option<Handler>,
    strategies: Vec<DefaultStrategy>,
}

impl RouteCompiler {
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        RouteCompiler {
            config,
            validators: Arc::new(SchemaValidatorFactory),
            handlers: Arc::new(ManifestLoader),
            probe: Arc::new(FsProbe),
            authorizers: Arc::new(ManifestLoader),
            tree: None,
            default_handler: None,
            strategies: vec![DefaultStrategy::HandlerTree, DefaultStrategy::DefaultHandler],
        }
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[must_use]
    pub fn with_validators(mut self, factory: impl ValidatorFactory + 'static) -> Self {
        self.validators = Arc::new(factory);
        self
    }

    /// Use one value as both handler loader and existence check, e.g. a
    /// [`crate::resolve::ModuleRegistry`].
    #[must_use]
    pub fn with_handler_modules<M>(mut self, modules: M) -> Self
    where
        M: ModuleLoader<Handler> + ModuleProbe + 'static,
    {
        let modules = Arc::new(modules);
        self.handlers = Arc::clone(&modules) as Arc<dyn ModuleLoader<Handler>>;
        self.probe = modules;
        self
    }

    #[must_use]
    pub fn with_handler_loader(mut self, loader: impl ModuleLoader<Handler> + 'static) -> Self {
        self.handlers = Arc::new(loader);
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: impl ModuleProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    #[must_use]
    pub fn with_authorizer_loader(
        mut self,
        loader: impl ModuleLoader<Authorizer> + 'static,
    ) -> Self {
        self.authorizers = Arc::new(loader);
        self
    }

    #[must_use]
    pub fn with_handler_tree(mut self, tree: HandlerTree) -> Self {
        self.tree = Some(tree);
        self
    }

    #[must_use]
    pub fn with_default_handler(mut self, handler: Handler) -> Self {
        self.default_handler = Some(handler);
        self
    }

    /// Replace the default-handler strategy list.
    #[must_use]
    pub fn with_default_strategies(mut self, strategies: Vec<DefaultStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Compile every declared operation.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when a security requirement names an unknown
    /// scheme or scope. Handler problems never fail compilation; the route is
    /// dropped instead.
    pub fn compile(&self, api: &ApiDescription) -> Result<Vec<RouteDescriptor>, CompileError> {
        let basedir = absolute(Path::new(""), &self.config.basedir);
        let handler_root = self.config.handler_root(&basedir);
        let security = SecurityCompiler::new(
            self.authorizers.as_ref(),
            &basedir,
            self.config.security_root.as_deref(),
        );

        let mut routes = Vec::with_capacity(api.operation_count());
        let mut dropped = 0usize;

        for (declared, item) in &api.paths {
            for (method, operation) in item.operations() {
                let path = self
                    .config
                    .base_path_mode
                    .apply(api.base_path.as_deref(), declared);

                let requirement = first_declared([
                    operation.security.as_ref(),
                    item.security.as_ref(),
                    api.security.as_ref(),
                ]);
                let requirements = security.requirements(
                    api.security_definitions.as_ref(),
                    requirement,
                    &path,
                    &method,
                )?;

                let mut draft = RouteDraft {
                    path,
                    name: operation.operation_id.clone(),
                    description: operation.description.clone(),
                    method: method.clone(),
                    security: None,
                    requirements: Vec::new(),
                    consumes: first_declared([operation.consumes.as_ref(), api.consumes.as_ref()])
                        .cloned(),
                    produces: first_declared([operation.produces.as_ref(), api.produces.as_ref()])
                        .cloned(),
                    json: first_declared([operation.json.as_ref(), api.json.as_ref()]).copied(),
                    cache: first_declared([operation.cache.as_ref(), api.cache.as_ref()]).cloned(),
                    config: first_declared([operation.config.as_ref(), api.config.as_ref()])
                        .cloned(),
                    jsonp: first_declared([operation.jsonp.as_ref(), api.jsonp.as_ref()]).cloned(),
                };
                draft.set_security(requirements);

                let parameters = merge_parameters(&item.parameters, &operation.parameters);
                let validators = self.validators.make_all(&parameters, &draft);

                match self.resolve_handler(&basedir, &handler_root, declared, &method, operation) {
                    Some(handler) => routes.push(draft.assemble(validators, handler)),
                    None => {
                        dropped += 1;
                        debug!(
                            path = %draft.path,
                            method = %method,
                            "No handler resolved; route dropped"
                        );
                    }
                }
            }
        }

        info!(
            routes = routes.len(),
            dropped,
            base_path = ?api.base_path,
            "Compiled route table"
        );
        Ok(routes)
    }

    fn resolve_handler(
        &self,
        basedir: &Path,
        handler_root: &Path,
        declared: &str,
        method: &Method,
        operation: &Operation,
    ) -> Option<Handler> {
        if let Some(reference) = &operation.handler {
            if let Some(handler) = self.explicit_handler(basedir, handler_root, reference, method) {
                debug!(path = %declared, method = %method, source = "x-handler", "Resolved handler");
                return Some(handler);
            }
        }

        let found = self.strategies.iter().find_map(|strategy| {
            let handler = match strategy {
                DefaultStrategy::HandlerTree => self.tree.as_ref()?.lookup(declared, method),
                DefaultStrategy::DefaultHandler => self.default_handler.clone(),
            }?;
            Some((strategy, handler))
        });
        if let Some((strategy, _)) = &found {
            debug!(path = %declared, method = %method, source = ?strategy, "Resolved handler");
        }
        found.map(|(_, handler)| handler)
    }

    fn explicit_handler(
        &self,
        basedir: &Path,
        handler_root: &Path,
        reference: &Reference<Handler>,
        method: &Method,
    ) -> Option<Handler> {
        if let Reference::Module(module) = reference {
            let location = absolute(handler_root, module);
            if !self.probe.exists(&location) {
                warn!(
                    module = %location.display(),
                    method = %method,
                    "x-handler module not found; using default handler"
                );
                return None;
            }
        }

        let handler = resolve(self.handlers.as_ref(), basedir, reference, Some(method));
        if handler.is_none() {
            warn!(
                reference = ?reference,
                method = %method,
                "x-handler did not resolve for this method; using default handler"
            );
        }
        handler
    }
}

/// Compile `api` with the stock collaborators.
///
/// `tree` and `default_handler` feed the default strategies;
/// `validators` is the validator aggregator.
///
/// # Errors
///
/// See [`RouteCompiler::compile`].
pub fn compile(
    api: &ApiDescription,
    config: CompilerConfig,
    tree: Option<HandlerTree>,
    default_handler: Option<Handler>,
    validators: impl ValidatorFactory + 'static,
) -> Result<Vec<RouteDescriptor>, CompileError> {
    let mut compiler = RouteCompiler::new(config).with_validators(validators);
    if let Some(tree) = tree {
        compiler = compiler.with_handler_tree(tree);
    }
    if let Some(handler) = default_handler {
        compiler = compiler.with_default_handler(handler);
    }
    compiler.compile(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ModuleRegistry;
    use crate::spec::ParameterLocation;
    use serde_json::json;

    fn param(location: ParameterLocation, name: &str, kind: Option<&str>) -> Parameter {
        let mut p = Parameter::new(location, name);
        p.kind = kind.map(str::to_string);
        p
    }

    #[test]
    fn test_merge_parameters_operation_wins() {
        let merged = merge_parameters(
            &[
                param(ParameterLocation::Query, "x", None),
                param(ParameterLocation::Path, "id", Some("string")),
            ],
            &[
                param(ParameterLocation::Query, "x", Some("integer")),
                param(ParameterLocation::Header, "x", None),
            ],
        );
        assert_eq!(merged.len(), 3);
        let keys: Vec<_> = merged.keys().map(|(l, n)| format!("{l}:{n}")).collect();
        assert_eq!(keys, vec!["query:x", "path:id", "header:x"]);
        let x = &merged[&(ParameterLocation::Query, "x".to_string())];
        assert_eq!(x.kind.as_deref(), Some("integer"));
    }

    #[test]
    fn test_first_declared() {
        let op = Some(1);
        let global = Some(2);
        assert_eq!(first_declared([op.as_ref(), global.as_ref()]), Some(&1));
        assert_eq!(first_declared([None, global.as_ref()]), Some(&2));
        assert_eq!(first_declared::<i32, 2>([None, None]), None);
    }

    #[test]
    fn test_fields_fall_back_to_description() {
        let api: ApiDescription = serde_json::from_value(json!({
            "consumes": ["application/json"],
            "produces": ["application/json"],
            "json": true,
            "jsonp": "callback",
            "paths": {
                "/pets": {
                    "get": { "operationId": "list", "produces": ["text/plain"], "json": false },
                    "post": { "operationId": "add", "cache": { "ttl": 5 } }
                }
            }
        }))
        .unwrap();

        let routes = RouteCompiler::new(CompilerConfig::new("/srv/api"))
            .with_handler_modules(ModuleRegistry::<Handler>::new())
            .with_default_handler(crate::echo::echo())
            .compile(&api)
            .unwrap();

        assert_eq!(routes.len(), 2);
        let get = &routes[0];
        assert_eq!(get.produces, Some(vec!["text/plain".to_string()]));
        assert_eq!(get.consumes, Some(vec!["application/json".to_string()]));
        assert_eq!(get.json, Some(false));
        assert_eq!(get.jsonp.as_deref(), Some("callback"));
        let post = &routes[1];
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.json, Some(true));
        assert_eq!(post.cache, Some(json!({ "ttl": 5 })));
        assert_eq!(post.config, None);
    }

    #[test]
    fn test_strategy_order_is_configurable() {
        let api: ApiDescription = serde_json::from_value(json!({
            "paths": { "/pets": { "get": {} } }
        }))
        .unwrap();
        let from_tree = crate::echo::echo();
        let fallback = crate::echo::echo();
        let mut tree = HandlerTree::new();
        tree.insert("/pets", &Method::GET, Arc::clone(&from_tree));

        let compiler = RouteCompiler::new(CompilerConfig::default())
            .with_handler_tree(tree)
            .with_default_handler(Arc::clone(&fallback));
        let routes = compiler.compile(&api).unwrap();
        assert!(crate::handler::same_callable(&routes[0].handler, &from_tree));

        let routes = compiler
            .with_default_strategies(vec![DefaultStrategy::DefaultHandler])
            .compile(&api)
            .unwrap();
        assert!(crate::handler::same_callable(&routes[0].handler, &fallback));
    }
}
