use crate::handler::{handler_fn, params_to_json, Handler, HandlerRequest, HandlerResponse};

/// Default handler used by the CLI: echoes back what it was given.
#[must_use]
pub fn echo_handler(req: HandlerRequest) -> HandlerResponse {
    HandlerResponse::json(
        200,
        serde_json::json!({
            "handler": req.route_name,
            "method": req.method.to_string(),
            "path": req.path,
            "params": params_to_json(&req.path_params),
            "query": params_to_json(&req.query_params),
            "body": req.body,
        }),
    )
}

#[must_use]
pub fn echo() -> Handler {
    handler_fn(echo_handler)
}
