//! Flow data model (spec §3): the declarative shape loaded from flow files
//! and executed by the Flow Executor (C17).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::value_store::ValueStore;

pub const FLOW_FILE_EXTENSIONS: &[&str] = &["flow.yaml", "flow.yml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub entrypoint: Entrypoint,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    pub steps: Vec<Step>,
    #[serde(rename = "return")]
    pub return_spec: ReturnSpec,
    #[serde(default, rename = "onErrorBody")]
    pub on_error_body: Option<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrypoint {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: HttpEntrypointConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpEntrypointConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "bodyType")]
    pub body_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub args: HashMap<String, Value>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default, rename = "fallbackBody")]
    pub fallback_body: Option<Box<Step>>,
    #[serde(default, rename = "compensateBody")]
    pub compensate_body: Option<Box<Step>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    None,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts", rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(default, rename = "delayMs")]
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
    #[serde(default, rename = "maxDelayMs")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter: bool,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default, rename = "nonRetryable")]
    pub non_retryable: Vec<String>,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff() -> Backoff {
    Backoff::None
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 1,
            delay_ms: 0,
            backoff: Backoff::None,
            max_delay_ms: u64::MAX,
            jitter: false,
            when: None,
            non_retryable: Vec::new(),
        }
    }
}

/// The path a step's body ran on, for compensation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPath {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CompensationEntry {
    pub step_id: String,
    pub body: Step,
    pub path: BodyPath,
}

#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub handler_name: String,
    pub args: HashMap<String, Value>,
}

/// Per-request execution state (spec §3 Execution). Owns its `ValueStore`
/// and `CompensationStack` exclusively; the container is shared read-only.
pub struct Execution {
    pub id: Uuid,
    pub store: ValueStore,
    pub flow: Flow,
    pub response_descriptor: Option<ResponseDescriptor>,
    pub compensation_stack: Vec<CompensationEntry>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl Execution {
    pub fn new(flow: Flow) -> Self {
        Execution {
            id: Uuid::new_v4(),
            store: ValueStore::new(),
            flow,
            response_descriptor: None,
            compensation_stack: Vec::new(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }
}
