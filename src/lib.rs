//! # brrtroutes
//!
//! **brrtroutes** compiles a Swagger 2.0 style API description into a flat,
//! dispatch-ready route table.
//!
//! ## Overview
//!
//! Given a description and a set of handler modules, compilation produces one
//! [`RouteDescriptor`] per declared (path, verb) pair that has a handler. Each
//! descriptor carries:
//!
//! - the resolved request handler
//! - ordered parameter validators
//! - the compiled security map: required scopes and an authorizer per scheme
//! - the effective `consumes`, `produces`, `json`, `cache`, `config`, `jsonp`
//!
//! Compilation is a single synchronous pass run once at service startup. The
//! only fatal errors are security requirements naming an unknown scheme or
//! scope ([`CompileError`]); every handler problem falls back to a default or
//! drops the route.
//!
//! ## Architecture
//!
//! - **[`spec`]** - the description model and YAML/JSON loading
//! - **[`compile`]** - the route compiler
//! - **[`security`]** - security requirement compilation and authorizers
//! - **[`resolve`]** - handler/authorizer references, module loaders, the handler tree
//! - **[`validator`]** - the validator aggregator and stock `jsonschema` validators
//! - **[`handler`]** - request/response types and the handler trait
//! - **[`config`]** / **[`logging`]** - configuration and `tracing` setup
//! - **[`cli`]** - the `brrtroutes` command
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Compiler as compile::RouteCompiler
//!     participant Security as security::SecurityCompiler
//!     participant Validators as validator::ValidatorFactory
//!     participant Resolver as resolve::resolve
//!
//!     App->>Compiler: compile(&api)
//!     loop every path × verb
//!         Compiler->>Security: build(definitions, requirement)
//!         Security->>Resolver: x-authorize / {security_root}/{scheme}
//!         Security-->>Compiler: Option<SecurityMap> or CompileError
//!         Compiler->>Validators: make_all(parameters, draft)
//!         Compiler->>Resolver: x-handler (if it exists under the handler root)
//!         Compiler->>Compiler: handler tree, then default handler
//!     end
//!     Compiler-->>App: Vec<RouteDescriptor>
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtroutes::handler::{handler_fn, HandlerResponse};
//! use brrtroutes::resolve::ModuleRegistry;
//! use brrtroutes::{CompilerConfig, RouteCompiler};
//!
//! let api = brrtroutes::spec::parse_api(
//!     r#"
//! basePath: /v1
//! paths:
//!   /pets:
//!     get:
//!       operationId: list_pets
//!       x-handler: handlers/pets
//! "#,
//!     true,
//! )
//! .unwrap();
//!
//! let mut modules = ModuleRegistry::new();
//! modules.register_exports(
//!     "/srv/api/handlers/pets",
//!     [("get", handler_fn(|_req| HandlerResponse::json(200, serde_json::json!([]))))],
//! );
//!
//! let routes = RouteCompiler::new(CompilerConfig::new("/srv/api"))
//!     .with_handler_modules(modules)
//!     .compile(&api)
//!     .unwrap();
//!
//! assert_eq!(routes.len(), 1);
//! assert_eq!(routes[0].path, "/v1/pets");
//! assert_eq!(routes[0].name.as_deref(), Some("list_pets"));
//! ```
//!
//! ## Handler modules
//!
//! Outside of tests, handler and authorizer modules are usually declarative
//! files read by [`resolve::ManifestLoader`]:
//!
//! ```yaml
//! # handlers/pets.yaml
//! get:  { status: 200, body: [] }
//! post: { status: 201, body: { id: 1 } }
//! ```
//!
//! ```yaml
//! # security/api_key.yaml
//! kind: api_key
//! in: header
//! name: X-API-Key
//! keys: [test123]
//! ```
//!
//! ## Logging
//!
//! The library emits `tracing` events only; binaries install a subscriber with
//! [`logging::init_logging`]. Set `BRRTR_LOG_LEVEL=debug` to see every handler
//! decision.

pub mod cli;
pub mod compile;
pub mod config;
pub mod echo;
pub mod error;
pub mod handler;
pub mod logging;
pub mod resolve;
pub mod security;
pub mod spec;
pub mod validator;

pub use compile::{compile, BasePathMode, RouteCompiler, RouteDescriptor};
pub use config::CompilerConfig;
pub use error::{CompileError, LoadError};
pub use handler::{Handler, HandlerRequest, HandlerResponse};
pub use resolve::{HandlerTree, Reference};
pub use security::{Authorizer, SecurityProvider, SecurityRequest};
pub use spec::{load_api, ApiDescription};
pub use validator::{SchemaValidatorFactory, ValidationIssue, ValidatorFactory};
