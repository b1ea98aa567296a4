#![allow(dead_code)]

pub mod fixtures {
    use brrtroutes::handler::{handler_fn, Handler, HandlerRequest, HandlerResponse};
    use brrtroutes::security::{authorizer_fn, Authorizer, SecurityRequest};
    use brrtroutes::spec::{parse_api, ApiDescription};
    use brrtroutes::RouteDescriptor;
    use http::Method;
    use serde_json::json;

    /// Base directory the in-memory fixtures pretend to live in.
    pub const BASEDIR: &str = "/srv/petstore";

    pub const PETSTORE_YAML: &str = r#"swagger: "2.0"
info:
  title: Pet Store
  version: "1.0.0"
basePath: /v1
consumes: [application/json]
produces: [application/json]
security:
  - api_key: []
securityDefinitions:
  api_key:
    type: apiKey
    name: X-API-Key
    in: header
  oauth2:
    type: oauth2
    flow: implicit
    authorizationUrl: https://auth.example.com/authorize
    scopes:
      write: modify pets
      read: read pets
paths:
  /pets:
    parameters:
      - { in: query, name: x }
      - { in: query, name: limit, type: integer }
    get:
      operationId: list_pets
      description: List every pet
      x-handler: handlers/pets
      parameters:
        - { in: query, name: x, type: integer }
    post:
      operationId: add_pet
      x-handler: handlers/pets
      security:
        - oauth2: [write]
      parameters:
        - in: body
          name: pet
          required: true
          schema:
            type: object
            required: [name]
            properties:
              name: { type: string }
    delete:
      operationId: clear_pets
      x-handler: handlers/pets
  /pets/{id}:
    security: []
    parameters:
      - { in: path, name: id, type: integer, required: true }
    get:
      operationId: get_pet
    put:
      operationId: update_pet
      x-handler: handlers/missing
"#;

    #[must_use]
    pub fn petstore() -> ApiDescription {
        parse_api(PETSTORE_YAML, true).unwrap()
    }

    /// Handler answering `{"fn": name}`.
    #[must_use]
    pub fn marker(name: &'static str) -> Handler {
        handler_fn(move |_req| HandlerResponse::json(200, json!({ "fn": name })))
    }

    /// Authorizer that always answers `verdict`.
    #[must_use]
    pub fn fixed_authorizer(verdict: bool) -> Authorizer {
        authorizer_fn(move |_: &str, _: &[String], _: &SecurityRequest<'_>| verdict)
    }

    /// Name reported by a [`marker`] handler behind `route`.
    #[must_use]
    pub fn handler_name(route: &RouteDescriptor) -> String {
        let resp = route.handle(HandlerRequest::new(route.method.clone(), route.path.clone()));
        resp.body["fn"].as_str().unwrap_or_default().to_string()
    }

    #[must_use]
    pub fn find<'a>(routes: &'a [RouteDescriptor], method: Method, path: &str) -> &'a RouteDescriptor {
        routes
            .iter()
            .find(|r| r.method == method && r.path == path)
            .unwrap_or_else(|| panic!("no route for {method} {path}"))
    }
}

pub mod module_tree {
    use std::path::{Path, PathBuf};

    /// Write `content` at `root/relative`, creating parent directories.
    pub fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }
}
