//! A hand-written stand-in for what the build pipeline would otherwise load
//! from a project's `*.flow.yaml` files, embedded directly into the binary.

use std::collections::HashMap;

use serde_json::json;
use sflowg_core::runtime::flow::{Entrypoint, Flow, HttpEntrypointConfig, ReturnSpec, Step};

/// `GET /greet/{name}` - generates a request id, builds a greeting for the
/// path's `name` segment, and returns both as JSON.
pub fn greet_flow() -> Flow {
    let generate_step = Step {
        id: "generate".to_string(),
        kind: "uuidgen.generate".to_string(),
        condition: None,
        args: HashMap::new(),
        retry: None,
        timeout: None,
        fallback_body: None,
        compensate_body: None,
    };

    let mut greet_args = HashMap::new();
    greet_args.insert("name".to_string(), json!("request.pathVariables.name"));

    let greet_step = Step {
        id: "greeting".to_string(),
        kind: "greeter.greet".to_string(),
        condition: None,
        args: greet_args,
        retry: None,
        timeout: None,
        fallback_body: None,
        compensate_body: None,
    };

    let mut return_args = HashMap::new();
    return_args.insert("requestId".to_string(), json!("generate.result.id"));
    return_args.insert("message".to_string(), json!("greeting.result.message"));

    Flow {
        id: "greet".to_string(),
        entrypoint: Entrypoint {
            kind: "http".to_string(),
            config: HttpEntrypointConfig {
                method: "get".to_string(),
                path: "/greet/{name}".to_string(),
                body_type: None,
            },
        },
        properties: HashMap::new(),
        steps: vec![generate_step, greet_step],
        return_spec: ReturnSpec {
            kind: "http.json".to_string(),
            args: return_args,
        },
        on_error_body: None,
    }
}
