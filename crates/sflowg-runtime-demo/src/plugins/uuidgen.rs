//! A dependency-free local plugin exposing a single `MapTask`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sflowg_core::runtime::container::{Initializer, Shutdowner};
use sflowg_core::runtime::error::FlowError;

#[derive(Default)]
pub struct UuidgenPlugin;

impl UuidgenPlugin {
    /// `MapTask` that ignores its arguments and returns a freshly generated
    /// identifier under `id`.
    pub fn generate(&self, _args: HashMap<String, Value>) -> Result<HashMap<String, Value>, FlowError> {
        let mut out = HashMap::new();
        out.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        Ok(out)
    }
}

#[async_trait]
impl Initializer for UuidgenPlugin {}

#[async_trait]
impl Shutdowner for UuidgenPlugin {}
