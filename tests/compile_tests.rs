#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Route compiler behaviour against in-memory modules.

mod common;

use brrtroutes::compile::{RouteDraft, RouteCompiler};
use brrtroutes::resolve::{ModuleRegistry, Reference};
use brrtroutes::security::{Authorizer, SecurityRequest};
use brrtroutes::spec::parse_api;
use brrtroutes::validator::{ParameterMap, ParameterValidator, SchemaValidatorFactory};
use brrtroutes::{
    compile, BasePathMode, CompileError, CompilerConfig, Handler, HandlerRequest, HandlerTree,
};
use common::fixtures::{find, fixed_authorizer, handler_name, marker, petstore, BASEDIR};
use http::Method;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn pets_module() -> ModuleRegistry<Handler> {
    let mut modules = ModuleRegistry::new();
    modules.register_exports(
        format!("{BASEDIR}/handlers/pets"),
        [("get", marker("fn1")), ("post", marker("fn2"))],
    );
    modules
}

fn compiler(modules: ModuleRegistry<Handler>) -> RouteCompiler {
    RouteCompiler::new(CompilerConfig::new(BASEDIR))
        .with_handler_modules(modules)
        .with_authorizer_loader(ModuleRegistry::<Authorizer>::new())
}

#[test]
fn test_explicit_handler_selects_export_by_verb() {
    let routes = compiler(pets_module())
        .with_default_handler(marker("default"))
        .compile(&petstore())
        .unwrap();

    assert_eq!(handler_name(find(&routes, Method::GET, "/v1/pets")), "fn1");
    assert_eq!(handler_name(find(&routes, Method::POST, "/v1/pets")), "fn2");
    // no `delete` export
    assert_eq!(handler_name(find(&routes, Method::DELETE, "/v1/pets")), "default");
}

#[test]
fn test_one_descriptor_per_operation_in_declaration_order() {
    let routes = compiler(pets_module())
        .with_default_handler(marker("default"))
        .compile(&petstore())
        .unwrap();

    let order: Vec<(Method, &str)> = routes
        .iter()
        .map(|r| (r.method.clone(), r.path.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Method::GET, "/v1/pets"),
            (Method::POST, "/v1/pets"),
            (Method::DELETE, "/v1/pets"),
            (Method::GET, "/v1/pets/{id}"),
            (Method::PUT, "/v1/pets/{id}"),
        ]
    );
    assert_eq!(routes[0].name.as_deref(), Some("list_pets"));
    assert_eq!(routes[0].description.as_deref(), Some("List every pet"));
}

#[test]
fn test_operations_without_handler_are_dropped() {
    let routes = compiler(pets_module()).compile(&petstore()).unwrap();
    let kept: Vec<_> = routes.iter().map(|r| r.name.clone().unwrap()).collect();
    assert_eq!(kept, vec!["list_pets", "add_pet"]);

    let routes = compiler(ModuleRegistry::new()).compile(&petstore()).unwrap();
    assert!(routes.is_empty());
}

#[test]
fn test_missing_module_falls_back_to_default() {
    let routes = compiler(pets_module())
        .with_default_handler(marker("default"))
        .compile(&petstore())
        .unwrap();
    // `x-handler: handlers/missing` is not registered
    assert_eq!(handler_name(find(&routes, Method::PUT, "/v1/pets/{id}")), "default");
}

#[test]
fn test_bound_handler_skips_existence_check() {
    let mut api = petstore();
    api.paths.get_mut("/pets/{id}").unwrap().get.as_mut().unwrap().handler =
        Some(Reference::Bound(marker("bound")));

    let routes = compiler(ModuleRegistry::new()).compile(&api).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(handler_name(&routes[0]), "bound");
}

#[test]
fn test_handler_tree_precedes_default_handler() {
    let mut tree = HandlerTree::new();
    tree.insert("/pets/{id}", &Method::GET, marker("tree"));

    let routes = compiler(pets_module())
        .with_handler_tree(tree)
        .with_default_handler(marker("default"))
        .compile(&petstore())
        .unwrap();
    assert_eq!(handler_name(find(&routes, Method::GET, "/v1/pets/{id}")), "tree");
    assert_eq!(handler_name(find(&routes, Method::PUT, "/v1/pets/{id}")), "default");
}

#[test]
fn test_operation_parameters_override_path_parameters() {
    let routes = compiler(pets_module()).compile(&petstore()).unwrap();
    let list = find(&routes, Method::GET, "/v1/pets");

    let labels: Vec<String> = list.validators.iter().map(|v| v.parameter.label()).collect();
    assert_eq!(labels, vec!["query:x", "query:limit"]);
    assert_eq!(list.validators[0].parameter.kind.as_deref(), Some("integer"));

    let add = find(&routes, Method::POST, "/v1/pets");
    let labels: Vec<String> = add.validators.iter().map(|v| v.parameter.label()).collect();
    assert_eq!(labels, vec!["query:x", "query:limit", "body:pet"]);
    assert_eq!(add.validators[0].parameter.kind, None);
}

#[test]
fn test_security_inheritance() {
    let routes = compiler(pets_module())
        .with_default_handler(marker("default"))
        .compile(&petstore())
        .unwrap();

    // global
    let list = find(&routes, Method::GET, "/v1/pets");
    let security = list.security.as_ref().unwrap();
    assert_eq!(security.keys().collect::<Vec<_>>(), vec!["api_key"]);
    assert!(security["api_key"].scopes.is_empty());

    // operation
    let add = find(&routes, Method::POST, "/v1/pets");
    let security = add.security.as_ref().unwrap();
    assert_eq!(security.keys().collect::<Vec<_>>(), vec!["oauth2"]);
    assert_eq!(security["oauth2"].scopes, vec!["write".to_string()]);
    assert!(security["oauth2"].authorize.is_none());

    // path level `security: []`
    let get = find(&routes, Method::GET, "/v1/pets/{id}");
    assert!(get.security.as_ref().unwrap().is_empty());
}

#[test]
fn test_unknown_scope_is_fatal() {
    let api = parse_api(
        r#"
securityDefinitions:
  oauth2:
    type: oauth2
    scopes: { write: modify }
paths:
  /pets:
    get:
      security:
        - oauth2: [read]
"#,
        true,
    )
    .unwrap();

    let err = compiler(ModuleRegistry::new())
        .with_default_handler(marker("default"))
        .compile(&api)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnknownScope {
            scope: "read".into(),
            scheme: "oauth2".into(),
            path: "/pets".into(),
            method: Method::GET,
        }
    );
}

#[test]
fn test_unknown_scheme_is_fatal() {
    let api = parse_api(
        r#"
basePath: /v2
securityDefinitions:
  api_key: { type: apiKey, name: key, in: query }
security:
  - basic: []
paths:
  /health:
    get: {}
"#,
        true,
    )
    .unwrap();

    let err = compiler(ModuleRegistry::new()).compile(&api).unwrap_err();
    assert!(matches!(err, CompileError::UnknownSecurityScheme { ref scheme, .. } if scheme == "basic"));
    assert_eq!(
        err.to_string(),
        "Unrecognized security definition (basic) on GET /v2/health"
    );
}

#[test]
fn test_security_without_definitions_is_ignored() {
    let api = parse_api(
        "security:\n  - basic: []\npaths:\n  /health:\n    get: {}\n",
        true,
    )
    .unwrap();
    let routes = compiler(ModuleRegistry::new())
        .with_default_handler(marker("default"))
        .compile(&api)
        .unwrap();
    assert!(routes[0].security.is_none());
}

#[test]
fn test_x_authorize_wins_over_security_root() {
    let yaml = r#"
securityDefinitions:
  oauth2:
    type: oauth2
    scopes: { write: modify }
    x-authorize: auth/custom
paths:
  /pets:
    post:
      security:
        - oauth2: [write]
"#;
    let mut authorizers: ModuleRegistry<Authorizer> = ModuleRegistry::new();
    authorizers
        .register_callable(format!("{BASEDIR}/auth/custom"), fixed_authorizer(true))
        .register_callable(format!("{BASEDIR}/security/oauth2"), fixed_authorizer(false));

    let compile_with = |api: &brrtroutes::ApiDescription| {
        RouteCompiler::new(CompilerConfig::new(BASEDIR).with_security_root("security"))
            .with_handler_modules(ModuleRegistry::<Handler>::new())
            .with_authorizer_loader(authorizers.clone())
            .with_default_handler(marker("default"))
            .compile(api)
            .unwrap()
    };
    let req = HandlerRequest::default();

    let api = parse_api(yaml, true).unwrap();
    let routes = compile_with(&api);
    assert!(routes[0].authorize(&SecurityRequest::from(&req)));

    // without x-authorize the convention module answers
    let api = parse_api(&yaml.replace("    x-authorize: auth/custom\n", ""), true).unwrap();
    let routes = compile_with(&api);
    assert!(routes[0].security.as_ref().unwrap()["oauth2"].authorize.is_some());
    assert!(!routes[0].authorize(&SecurityRequest::from(&req)));
}

#[test]
fn test_compilation_is_idempotent() {
    let compiler = compiler(pets_module()).with_default_handler(marker("default"));
    let api = petstore();
    let first = compiler.compile(&api).unwrap();
    let second = compiler.compile(&api).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_base_path_mode_never() {
    let routes = RouteCompiler::new(
        CompilerConfig::new(BASEDIR).with_base_path_mode(BasePathMode::Never),
    )
    .with_handler_modules(pets_module())
    .compile(&petstore())
    .unwrap();
    assert_eq!(routes[0].path, "/pets");
}

#[test]
fn test_validator_factory_sees_every_draft() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let factory = move |params: &ParameterMap, route: &RouteDraft| {
        recorder.lock().unwrap().push(format!(
            "{} {} {}",
            route.method,
            route.path,
            route.security.as_ref().map_or(0, |s| s.len())
        ));
        params
            .values()
            .cloned()
            .map(ParameterValidator::presence)
            .collect::<Vec<_>>()
    };

    let routes = compiler(ModuleRegistry::new())
        .with_validators(factory)
        .compile(&petstore())
        .unwrap();
    assert!(routes.is_empty());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "GET /v1/pets 1",
            "POST /v1/pets 1",
            "DELETE /v1/pets 1",
            "GET /v1/pets/{id} 0",
            "PUT /v1/pets/{id} 0",
        ]
    );
}

#[test]
fn test_free_compile_with_schema_validators() {
    let mut tree = HandlerTree::new();
    tree.insert("/pets/{id}", &Method::GET, marker("tree"));

    // nothing exists on disk under BASEDIR, so every x-handler falls back
    let routes = compile(
        &petstore(),
        CompilerConfig::new(BASEDIR),
        Some(tree),
        Some(marker("default")),
        SchemaValidatorFactory,
    )
    .unwrap();
    assert_eq!(routes.len(), 5);
    assert_eq!(handler_name(find(&routes, Method::GET, "/v1/pets")), "default");

    let get = find(&routes, Method::GET, "/v1/pets/{id}");
    assert_eq!(handler_name(get), "tree");

    let mut req = HandlerRequest::new(Method::GET, "/v1/pets/{id}");
    req.path_params.push((Arc::from("id"), "abc".into()));
    assert!(get.validate(&req).is_err());

    let mut req = HandlerRequest::new(Method::GET, "/v1/pets/{id}");
    req.path_params.push((Arc::from("id"), "7".into()));
    assert_eq!(get.validate(&req).unwrap()["id"], json!(7));
}

#[test]
fn test_schemes_in_one_requirement_are_all_required() {
    let yaml = r#"
securityDefinitions:
  api_key: { type: apiKey, name: X-API-Key, in: header }
  oauth2:
    type: oauth2
    scopes: { write: modify }
paths:
  /pets:
    post:
      security:
        - api_key: []
          oauth2: [write]
    put:
      security:
        - api_key: []
        - oauth2: [write]
"#;
    let mut authorizers: ModuleRegistry<Authorizer> = ModuleRegistry::new();
    authorizers
        .register_callable(format!("{BASEDIR}/security/api_key"), fixed_authorizer(true))
        .register_callable(format!("{BASEDIR}/security/oauth2"), fixed_authorizer(false));

    let routes = RouteCompiler::new(CompilerConfig::new(BASEDIR).with_security_root("security"))
        .with_handler_modules(ModuleRegistry::<Handler>::new())
        .with_authorizer_loader(authorizers)
        .with_default_handler(marker("default"))
        .compile(&parse_api(yaml, true).unwrap())
        .unwrap();
    let req = HandlerRequest::default();

    let post = find(&routes, Method::POST, "/pets");
    assert_eq!(post.requirements.len(), 1);
    assert!(!post.authorize(&SecurityRequest::from(&req)));

    let put = find(&routes, Method::PUT, "/pets");
    assert_eq!(put.requirements.len(), 2);
    assert!(put.authorize(&SecurityRequest::from(&req)));
}

#[test]
fn test_broken_x_authorize_is_not_replaced() {
    let yaml = r#"
securityDefinitions:
  oauth2:
    type: oauth2
    scopes: { write: modify }
    x-authorize: auth/missing
paths:
  /pets:
    post:
      security:
        - oauth2: [write]
"#;
    let mut authorizers: ModuleRegistry<Authorizer> = ModuleRegistry::new();
    authorizers.register_callable(format!("{BASEDIR}/security/oauth2"), fixed_authorizer(true));

    let routes = RouteCompiler::new(CompilerConfig::new(BASEDIR).with_security_root("security"))
        .with_handler_modules(ModuleRegistry::<Handler>::new())
        .with_authorizer_loader(authorizers)
        .with_default_handler(marker("default"))
        .compile(&parse_api(yaml, true).unwrap())
        .unwrap();
    assert!(routes[0].security.as_ref().unwrap()["oauth2"].authorize.is_none());
}
