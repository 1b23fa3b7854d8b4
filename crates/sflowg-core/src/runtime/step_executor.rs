//! Step Executor (C16): dispatches a single step body by type, with
//! recursive expression evaluation, per spec §4.12.

use serde_json::Value;

use super::container::{Container, TaskContext};
use super::error::{FlowError, FlowErrorKind};
use super::expr;
use super::flow::{Execution, Flow, Step};
use super::value_store::ValueStore;

/// What running a step's body produced, from the Flow Executor's point of
/// view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Proceed to the next step in flow order.
    Continue,
    /// A `switch` branch fired; jump to the named step id.
    JumpTo(String),
    /// A `return` step set the Execution's response descriptor.
    ResponseSet,
}

/// Recursively evaluates `value` against `store`. Strings are always
/// treated as expressions and must evaluate successfully, except when
/// `lenient` is set (used for `return` args), where a failing expression
/// falls back to the original string so literal strings are usable there
/// (spec §4.12).
pub fn eval_value(value: &Value, store: &ValueStore, step_id: &str, lenient: bool) -> Result<Value, FlowError> {
    match value {
        Value::String(raw) => match expr::parse_and_eval(raw, store) {
            Ok(evaluated) => Ok(evaluated),
            Err(err) if lenient => {
                let _ = err;
                Ok(Value::String(raw.clone()))
            }
            Err(err) => Err(FlowError::new(
                FlowErrorKind::Permanent,
                "expression_error",
                err.to_string(),
                step_id,
            )),
        },
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                out.insert(key.clone(), eval_value(child, store, step_id, lenient)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_value(item, store, step_id, lenient)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Runs one attempt of `step`'s body (no retry/fallback bookkeeping; that's
/// the Flow Executor's responsibility).
pub async fn execute_body(
    step: &Step,
    flow: &Flow,
    execution: &mut Execution,
    container: &Container,
) -> Result<StepOutcome, FlowError> {
    match step.kind.as_str() {
        "assign" => execute_assign(step, execution),
        "switch" => execute_switch(step, flow, execution),
        "return" => execute_return(step, flow, execution),
        task_name => execute_task(task_name, step, execution, container).await,
    }
}

fn execute_assign(step: &Step, execution: &mut Execution) -> Result<StepOutcome, FlowError> {
    for (key, raw) in &step.args {
        let value = eval_value(raw, &execution.store, &step.id, false)?;
        execution.store.set(&format!("{}.{}", step.id, key), value);
    }
    Ok(StepOutcome::Continue)
}

fn execute_switch(step: &Step, flow: &Flow, execution: &mut Execution) -> Result<StepOutcome, FlowError> {
    let position_of = |target: &str| flow.steps.iter().position(|s| s.id == target).unwrap_or(usize::MAX);

    let mut branches: Vec<(&String, &Value)> = step.args.iter().collect();
    branches.sort_by_key(|(name, _)| position_of(name));

    for (branch_name, condition) in branches {
        let evaluated = eval_value(condition, &execution.store, &step.id, false)?;
        if is_truthy(&evaluated) {
            return Ok(StepOutcome::JumpTo((*branch_name).clone()));
        }
    }
    Ok(StepOutcome::Continue)
}

fn execute_return(step: &Step, flow: &Flow, execution: &mut Execution) -> Result<StepOutcome, FlowError> {
    let mut evaluated_args = std::collections::HashMap::with_capacity(flow.return_spec.args.len());
    for (key, raw) in &flow.return_spec.args {
        let value = eval_value(raw, &execution.store, &step.id, true)?;
        evaluated_args.insert(key.clone(), value);
    }
    execution.response_descriptor = Some(super::flow::ResponseDescriptor {
        handler_name: flow.return_spec.kind.clone(),
        args: evaluated_args,
    });
    Ok(StepOutcome::ResponseSet)
}

async fn execute_task(
    task_name: &str,
    step: &Step,
    execution: &mut Execution,
    container: &Container,
) -> Result<StepOutcome, FlowError> {
    let Some(task) = container.task(task_name) else {
        return Err(FlowError::new(
            FlowErrorKind::Permanent,
            "unknown_task",
            format!("no task registered for '{task_name}'"),
            &step.id,
        ));
    };

    let mut evaluated_args = serde_json::Map::with_capacity(step.args.len());
    for (key, raw) in &step.args {
        let value = eval_value(raw, &execution.store, &step.id, false)?;
        evaluated_args.insert(key.clone(), value);
    }
    let evaluated_args: std::collections::HashMap<String, Value> = evaluated_args.into_iter().collect();

    let ctx = TaskContext {
        execution_id: execution.id,
        cancellation: execution.cancellation.clone(),
    };

    match task(ctx, evaluated_args).await {
        Ok(result) => {
            execution
                .store
                .set_nested(&format!("{}.result", step.id), Value::Object(result.into_iter().collect()));
            Ok(StepOutcome::Continue)
        }
        Err(mut err) => {
            execution.store.set(&format!("{}.error", step.id), Value::String(err.message.clone()));
            err.step = step.id.clone();
            Err(err)
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::flow::{Entrypoint, HttpEntrypointConfig, ReturnSpec};
    use serde_json::json;
    use std::collections::HashMap;

    fn sample_flow(steps: Vec<Step>) -> Flow {
        Flow {
            id: "f".to_string(),
            entrypoint: Entrypoint {
                kind: "http".to_string(),
                config: HttpEntrypointConfig {
                    method: "post".to_string(),
                    path: "/x".to_string(),
                    body_type: None,
                },
            },
            properties: HashMap::new(),
            steps,
            return_spec: ReturnSpec {
                kind: "http.json".to_string(),
                args: HashMap::new(),
            },
            on_error_body: None,
        }
    }

    fn base_step(id: &str, kind: &str) -> Step {
        Step {
            id: id.to_string(),
            kind: kind.to_string(),
            condition: None,
            args: HashMap::new(),
            retry: None,
            timeout: None,
            fallback_body: None,
            compensate_body: None,
        }
    }

    #[tokio::test]
    async fn assign_stores_evaluated_value() {
        let mut step = base_step("s1", "assign");
        step.args.insert("greeting".to_string(), json!("\"hi\""));
        let flow = sample_flow(vec![step.clone()]);
        let mut execution = Execution::new(flow.clone());
        let container = Container::new();

        let outcome = execute_body(&step, &flow, &mut execution, &container).await.unwrap();
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(execution.store.get("s1.greeting"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn switch_jumps_to_first_true_branch_in_flow_order() {
        let mut switch_step = base_step("decide", "switch");
        switch_step.args.insert("b_step".to_string(), json!("true"));
        switch_step.args.insert("a_step".to_string(), json!("false"));
        let a_step = base_step("a_step", "return");
        let b_step = base_step("b_step", "return");
        let flow = sample_flow(vec![switch_step.clone(), a_step, b_step]);
        let mut execution = Execution::new(flow.clone());
        let container = Container::new();

        let outcome = execute_body(&switch_step, &flow, &mut execution, &container).await.unwrap();
        assert_eq!(outcome, StepOutcome::JumpTo("b_step".to_string()));
    }

    #[tokio::test]
    async fn return_step_sets_response_descriptor_leniently() {
        let mut flow_steps = vec![base_step("r", "return")];
        let step = flow_steps.remove(0);
        let mut flow = sample_flow(vec![step.clone()]);
        flow.return_spec.args.insert("message".to_string(), json!("literal text"));
        let mut execution = Execution::new(flow.clone());
        let container = Container::new();

        let outcome = execute_body(&step, &flow, &mut execution, &container).await.unwrap();
        assert_eq!(outcome, StepOutcome::ResponseSet);
        let descriptor = execution.response_descriptor.unwrap();
        assert_eq!(descriptor.args.get("message"), Some(&json!("literal text")));
    }

    #[tokio::test]
    async fn unknown_task_is_a_permanent_flow_error() {
        let step = base_step("t1", "nosuch.task");
        let flow = sample_flow(vec![step.clone()]);
        let mut execution = Execution::new(flow.clone());
        let container = Container::new();

        let err = execute_body(&step, &flow, &mut execution, &container).await.unwrap_err();
        assert_eq!(err.kind, FlowErrorKind::Permanent);
        assert_eq!(err.code, "unknown_task");
    }
}
