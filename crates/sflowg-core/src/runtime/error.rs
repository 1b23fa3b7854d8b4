//! Error taxonomy for the flow runtime (spec §7: ConfigError, FlowError,
//! HandlerError).

use serde::Serialize;
use thiserror::Error;

/// Classification of a [`FlowError`] (spec §3 FlowError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowErrorKind {
    Transient,
    Permanent,
    Timeout,
}

/// A structured, JSON-serializable step-level failure (spec §3 FlowError).
#[derive(Debug, Clone, Serialize)]
pub struct FlowError {
    #[serde(rename = "type")]
    pub kind: FlowErrorKind,
    pub code: String,
    pub message: String,
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, code: impl Into<String>, message: impl Into<String>, step: impl Into<String>) -> Self {
        FlowError {
            kind,
            code: code.into(),
            message: message.into(),
            step: step.into(),
            cause: None,
            retries: 0,
            meta: None,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}) at step '{}': {}", self.code, self.kind, self.step, self.message)
    }
}

impl std::error::Error for FlowError {}

/// Config Initializer failures (C15): defaults/validation failure at runtime
/// startup. Per spec §9, this is modeled as a fatal fault: the binary cannot
/// correctly serve requests with an invalid config.
#[derive(Debug, Error)]
#[error("configuration error: {} field(s) failed validation: {}", .failures.len(), render_failures(.failures))]
pub struct ConfigError {
    pub failures: Vec<FieldFailure>,
}

#[derive(Debug, Clone)]
pub struct FieldFailure {
    pub field: String,
    pub rule: String,
}

fn render_failures(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}:{}", f.field, f.rule))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Response handler failures (C18): unknown handler name or handler body
/// error. Yields a 500-class HTTP response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown response handler '{0}'")]
    Unknown(String),

    #[error("response handler '{handler}' failed: {message}")]
    Failed { handler: String, message: String },
}

/// Top-level runtime error aggregating every flow-runtime subsystem.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
