//! Config Initializer (C15): applies defaults, merges raw values, and
//! validates a plugin's config, per spec §4.11.
//!
//! Rust has no runtime struct-tag reflection, so each plugin config type
//! implements [`ConfigDefaults`]/[`Validate`] directly (spec §9's
//! reflection -> explicit descriptor substitution) instead of being driven
//! by declared field tags at runtime.

use std::collections::HashMap;

use serde_json::Value;

use super::error::{ConfigError, FieldFailure};

/// Applies field defaults onto a zero-valued config, the Rust counterpart of
/// "apply defaults from declared field tags" (spec §4.11 step 1).
pub trait ConfigDefaults: Sized {
    fn defaults() -> Self;
}

/// Merges a raw values map (environment + manifest literals) into a config
/// already carrying its defaults (spec §4.11 step 2).
pub trait MergeRawValues: Sized {
    fn merge_raw_values(self, raw: &HashMap<String, Value>) -> Self;
}

/// Runs field-level validation, returning every failing field and rule
/// (spec §4.11 step 3); a plugin config type implements this directly in
/// place of tag-driven `validate:"..."` rules.
pub trait Validate {
    fn validate(&self) -> Vec<FieldFailure>;
}

/// Runs the full three-step initialization sequence and converts validation
/// failures into a fatal [`ConfigError`] (spec §9: config errors panic at
/// startup).
pub fn initialize<C>(raw: &HashMap<String, Value>) -> Result<C, ConfigError>
where
    C: ConfigDefaults + MergeRawValues + Validate,
{
    let config = C::defaults().merge_raw_values(raw);
    let failures = config.validate();
    if failures.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError { failures })
    }
}

/// Collects a plugin's resolved config entries into the raw-values map
/// `initialize` expects (spec §4.8 step 1). The Program Emitter (C9) resolves
/// each manifest config value against the Value Template Parser (C3) at
/// codegen time: a literal becomes a literal `Value`, and a `${VAR}`/
/// `${VAR:default}` template becomes a generated `std::env::var` lookup
/// (panicking if required and absent) that runs in the emitted program's own
/// process. By the time the emitted `{{plugin}}_raw_values()` function calls
/// this, every entry is already a concrete value; this just gathers them.
pub fn raw_values_for(entries: impl IntoIterator<Item = (String, Value)>) -> HashMap<String, Value> {
    entries.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct SampleConfig {
        addr: String,
        retries: i64,
    }

    impl ConfigDefaults for SampleConfig {
        fn defaults() -> Self {
            SampleConfig {
                addr: "localhost:0".to_string(),
                retries: 3,
            }
        }
    }

    impl MergeRawValues for SampleConfig {
        fn merge_raw_values(mut self, raw: &HashMap<String, Value>) -> Self {
            if let Some(Value::String(s)) = raw.get("addr") {
                self.addr = s.clone();
            }
            if let Some(Value::Number(n)) = raw.get("retries") {
                if let Some(i) = n.as_i64() {
                    self.retries = i;
                }
            }
            self
        }
    }

    impl Validate for SampleConfig {
        fn validate(&self) -> Vec<FieldFailure> {
            let mut failures = Vec::new();
            if self.addr.is_empty() {
                failures.push(FieldFailure {
                    field: "addr".to_string(),
                    rule: "required".to_string(),
                });
            }
            if self.retries < 0 {
                failures.push(FieldFailure {
                    field: "retries".to_string(),
                    rule: "min:0".to_string(),
                });
            }
            failures
        }
    }

    #[test]
    fn raw_values_for_collects_entries() {
        let raw = raw_values_for([("addr".to_string(), json!("x:1")), ("retries".to_string(), json!(5))]);
        assert_eq!(raw.get("addr"), Some(&json!("x:1")));
        assert_eq!(raw.get("retries"), Some(&json!(5)));
    }

    #[test]
    fn applies_defaults_then_merges() {
        let mut raw = HashMap::new();
        raw.insert("addr".to_string(), json!("x:1"));
        let config: SampleConfig = initialize(&raw).unwrap();
        assert_eq!(config.addr, "x:1");
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn validation_failures_are_aggregated() {
        let mut raw = HashMap::new();
        raw.insert("addr".to_string(), json!(""));
        raw.insert("retries".to_string(), json!(-1));
        let err = initialize::<SampleConfig>(&raw).unwrap_err();
        assert_eq!(err.failures.len(), 2);
    }
}
