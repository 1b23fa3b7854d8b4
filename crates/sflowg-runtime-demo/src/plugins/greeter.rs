//! A local plugin with config and a single `MapTask`, standing in for what
//! the source introspector would discover in a project's `./plugins/greeter`
//! package.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sflowg_core::runtime::config_init::{ConfigDefaults, MergeRawValues, Validate};
use sflowg_core::runtime::container::{Initializer, Shutdowner};
use sflowg_core::runtime::error::{FieldFailure, FlowError, FlowErrorKind};

pub struct GreeterConfig {
    pub greeting: String,
}

impl ConfigDefaults for GreeterConfig {
    fn defaults() -> Self {
        GreeterConfig {
            greeting: "Hello".to_string(),
        }
    }
}

impl MergeRawValues for GreeterConfig {
    fn merge_raw_values(mut self, raw: &HashMap<String, Value>) -> Self {
        if let Some(Value::String(s)) = raw.get("greeting") {
            self.greeting = s.clone();
        }
        self
    }
}

impl Validate for GreeterConfig {
    fn validate(&self) -> Vec<FieldFailure> {
        if self.greeting.is_empty() {
            vec![FieldFailure {
                field: "greeting".to_string(),
                rule: "required".to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}

pub struct GreeterPlugin {
    config: GreeterConfig,
}

impl GreeterPlugin {
    pub fn new(config: GreeterConfig) -> Self {
        GreeterPlugin { config }
    }

    /// `MapTask` expecting a `name` argument, returning a `message` field.
    pub fn greet(&self, args: HashMap<String, Value>) -> Result<HashMap<String, Value>, FlowError> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| FlowError::new(FlowErrorKind::Permanent, "missing_name", "args.name is required", "greeter.greet"))?;

        let mut out = HashMap::new();
        out.insert(
            "message".to_string(),
            Value::String(format!("{}, {name}!", self.config.greeting)),
        );
        Ok(out)
    }
}

#[async_trait]
impl Initializer for GreeterPlugin {
    async fn initialize(&self) -> Result<(), sflowg_core::RuntimeError> {
        log::info!("greeter plugin ready with greeting '{}'", self.config.greeting);
        Ok(())
    }
}

#[async_trait]
impl Shutdowner for GreeterPlugin {}
