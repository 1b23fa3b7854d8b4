//! HTTP Frontend (C18): maps flow entrypoints to HTTP routes, builds the
//! per-request `Execution`, runs the flow, and dispatches the response
//! descriptor, per spec §4.14.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put, MethodRouter};
use axum::Router;
use serde_json::Value;

use super::container::{Container, HandlerOutcome, ResponseHandlerFn};
use super::error::HandlerError;
use super::flow::{Execution, Flow};
use super::flow_executor;
use super::value_store::ValueStore;

pub struct AppState {
    pub container: Arc<Container>,
    pub global_properties: ValueStore,
}

/// Builds the axum `Router` that serves every loaded flow.
pub fn build_router(flows: Vec<Flow>, state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    for flow in flows {
        let path = flow.entrypoint.config.path.clone();
        let method = flow.entrypoint.config.method.to_lowercase();
        let flow = Arc::new(flow);
        let method_router = route_for_method(&method, flow);
        router = router.route(&path, method_router);
    }
    router.with_state(state)
}

fn route_for_method(method: &str, flow: Arc<Flow>) -> MethodRouter<Arc<AppState>> {
    let handler = move |state: State<Arc<AppState>>,
                         path_params: AxumPath<HashMap<String, String>>,
                         query: Query<HashMap<String, String>>,
                         headers: HeaderMap,
                         body: Bytes| {
        let flow = flow.clone();
        async move { handle_request(flow, state, path_params, query, headers, body).await }
    };

    match method {
        "get" => get(handler),
        "put" => put(handler),
        "delete" => delete(handler),
        "patch" => patch(handler),
        _ => post(handler),
    }
}

async fn handle_request(
    flow: Arc<Flow>,
    State(state): State<Arc<AppState>>,
    AxumPath(path_params): AxumPath<HashMap<String, String>>,
    Query(query_params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started_at = Instant::now();
    let method = flow.entrypoint.config.method.clone();
    let path = flow.entrypoint.config.path.clone();

    let mut execution = Execution::new((*flow).clone());

    for (key, value) in state.global_properties.iter() {
        execution.store.set(key, value.clone());
    }
    for (key, value) in &flow.properties {
        execution.store.set_nested(key, value.clone());
    }

    for (key, value) in &path_params {
        execution.store.set(&format!("request.pathVariables.{key}"), Value::String(value.clone()));
    }
    for (key, value) in &query_params {
        execution.store.set(&format!("request.queryParameters.{key}"), Value::String(value.clone()));
    }
    for (name, value) in headers.iter() {
        if let Ok(s) = value.to_str() {
            execution
                .store
                .set(&format!("request.headers.{}", name.as_str()), Value::String(s.to_string()));
        }
    }

    if flow.entrypoint.config.body_type.as_deref() == Some("json") && !body.is_empty() {
        let raw_body = String::from_utf8_lossy(&body).into_owned();
        execution.store.set("request.rawBody", Value::String(raw_body.clone()));
        if let Ok(parsed) = serde_json::from_str::<Value>(&raw_body) {
            execution.store.set_nested("request.body", parsed);
        }
    }

    let flow_result = flow_executor::run(&flow, &mut execution, &state.container).await;

    let response = match flow_result {
        Ok(()) => dispatch_response(&state.container, execution.response_descriptor).await,
        Err(err) => {
            let message = format!("flow error: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    };

    log::info!(
        "{method} {path} flow={} status={} latency_ms={}",
        flow.id,
        response.status().as_u16(),
        started_at.elapsed().as_millis()
    );

    response
}

async fn dispatch_response(container: &Container, descriptor: Option<super::flow::ResponseDescriptor>) -> Response {
    let Some(descriptor) = descriptor else {
        return (StatusCode::OK, axum::Json(serde_json::json!({"status": "success"}))).into_response();
    };

    let Some(handler) = container.response_handler(&descriptor.handler_name) else {
        let message = format!("unknown response handler '{}'", descriptor.handler_name);
        return (StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
    };

    match handler(descriptor.args).await {
        Ok(outcome) => outcome_to_response(outcome),
        Err(err) => {
            let message = format!("response handler failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    }
}

fn outcome_to_response(outcome: HandlerOutcome) -> Response {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    for (name, value) in outcome.headers {
        builder = builder.header(name, value);
    }
    match builder.body(axum::body::Body::from(outcome.body.to_string())) {
        Ok(response) => response,
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "malformed response").into_response(),
    }
}

/// Built-in `http.json` response handler (spec §6): default status 200,
/// body defaults to `{}`.
pub fn http_json_handler() -> ResponseHandlerFn {
    Arc::new(|args: HashMap<String, Value>| {
        Box::pin(async move {
            let status = args.get("status").and_then(Value::as_u64).unwrap_or(200) as u16;
            let body = args.get("body").cloned().unwrap_or_else(|| serde_json::json!({}));
            let headers = args
                .get("headers")
                .and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                        .collect()
                })
                .unwrap_or_default();
            Ok(HandlerOutcome { status, headers, body })
        })
    })
}

/// Built-in `http.html` response handler: string body required.
pub fn http_html_handler() -> ResponseHandlerFn {
    Arc::new(|args: HashMap<String, Value>| {
        Box::pin(async move {
            let status = args.get("status").and_then(Value::as_u64).unwrap_or(200) as u16;
            let body = args
                .get("body")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::Failed {
                    handler: "http.html".to_string(),
                    message: "body is required".to_string(),
                })?
                .to_string();
            Ok(HandlerOutcome {
                status,
                headers: vec![("content-type".to_string(), "text/html".to_string())],
                body: Value::String(body),
            })
        })
    })
}

/// Built-in `http.redirect` response handler: status must be in `[300,399]`,
/// default 302.
pub fn http_redirect_handler() -> ResponseHandlerFn {
    Arc::new(|args: HashMap<String, Value>| {
        Box::pin(async move {
            let status = args.get("status").and_then(Value::as_u64).unwrap_or(302) as u16;
            if !(300..=399).contains(&status) {
                return Err(HandlerError::Failed {
                    handler: "http.redirect".to_string(),
                    message: format!("status {status} is not a valid redirect status"),
                });
            }
            let location = args
                .get("location")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::Failed {
                    handler: "http.redirect".to_string(),
                    message: "location is required".to_string(),
                })?
                .to_string();
            Ok(HandlerOutcome {
                status,
                headers: vec![("location".to_string(), location)],
                body: Value::Null,
            })
        })
    })
}

/// Registers every built-in response handler (spec §6) with `container`.
pub fn register_builtin_handlers(container: &mut Container) {
    container.register_response_handler("http.json", http_json_handler());
    container.register_response_handler("http.html", http_html_handler());
    container.register_response_handler("http.redirect", http_redirect_handler());
}
