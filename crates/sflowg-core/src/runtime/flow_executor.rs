//! Flow Executor (C17): the orchestration core. Sequences steps, applies
//! retry/backoff, runs fallback bodies, unwinds compensations LIFO, and
//! invokes the flow-level error handler, per spec §4.13.

use std::time::Duration;

use serde_json::Value;

use super::container::Container;
use super::error::{FlowError, FlowErrorKind};
use super::flow::{Backoff, BodyPath, CompensationEntry, Execution, Flow, RetryConfig, Step};
use super::step_executor::{self, StepOutcome};

/// Runs `flow` to completion against `execution`. Returns `Ok(())` once a
/// response descriptor is set (directly, via the on-error handler, or by
/// exhausting every step with none set, left to the HTTP Frontend's
/// default), or the final, unhandled `FlowError`.
pub async fn run(flow: &Flow, execution: &mut Execution, container: &Container) -> Result<(), FlowError> {
    let mut pending_jump: Option<String> = None;
    let mut index = 0usize;

    while index < flow.steps.len() {
        let step = flow.steps[index].clone();

        if let Some(target) = &pending_jump {
            if step.id != *target {
                index += 1;
                continue;
            }
            pending_jump = None;
        }

        if execution.cancellation.is_cancelled() {
            let fe = FlowError::new(FlowErrorKind::Timeout, "cancelled", "execution was cancelled", &step.id);
            return handle_failure(flow, execution, container, fe).await;
        }

        if let Some(condition) = &step.condition {
            match super::expr::parse_and_eval(condition, &execution.store) {
                Ok(value) if !is_truthy(&value) => {
                    index += 1;
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    let fe = FlowError::new(FlowErrorKind::Permanent, "condition_error", err.to_string(), &step.id);
                    return handle_failure(flow, execution, container, fe).await;
                }
            }
        }

        let retry = step.retry.clone().unwrap_or_default();
        let primary_result = run_with_retry(&step, flow, execution, container, &retry).await;

        let outcome = match primary_result {
            Ok(outcome) => {
                push_compensation(&step, execution, BodyPath::Primary);
                outcome
            }
            Err(primary_err) => match &step.fallback_body {
                Some(fallback_step) => match step_executor::execute_body(fallback_step, flow, execution, container).await {
                    Ok(outcome) => {
                        push_compensation(fallback_step, execution, BodyPath::Fallback);
                        outcome
                    }
                    Err(fallback_err) => return handle_failure(flow, execution, container, fallback_err).await,
                },
                None => return handle_failure(flow, execution, container, primary_err).await,
            },
        };

        if let Some(Value::String(next_id)) = execution.store.get(&format!("{}.__next", step.id)).cloned() {
            pending_jump = Some(next_id);
        }

        match outcome {
            StepOutcome::ResponseSet => return Ok(()),
            StepOutcome::JumpTo(target) => {
                pending_jump = Some(target);
                index = 0;
                continue;
            }
            StepOutcome::Continue => {}
        }

        if pending_jump.is_some() {
            index = 0;
            continue;
        }

        index += 1;
    }

    Ok(())
}

fn push_compensation(step: &Step, execution: &mut Execution, path: BodyPath) {
    if let Some(compensate_body) = &step.compensate_body {
        execution.compensation_stack.push(CompensationEntry {
            step_id: step.id.clone(),
            body: (**compensate_body).clone(),
            path,
        });
    }
}

async fn run_with_retry(
    step: &Step,
    flow: &Flow,
    execution: &mut Execution,
    container: &Container,
    retry: &RetryConfig,
) -> Result<StepOutcome, FlowError> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let body = step_executor::execute_body(step, flow, execution, container);
        let result = match step.timeout {
            Some(timeout_ms) => match tokio::time::timeout(Duration::from_millis(timeout_ms), body).await {
                Ok(inner) => inner,
                Err(_) => Err(FlowError::new(
                    FlowErrorKind::Timeout,
                    "step_timeout",
                    format!("step timed out after {timeout_ms}ms"),
                    &step.id,
                )),
            },
            None => body.await,
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(mut err) => {
                err.retries = attempt - 1;
                if attempt >= max_attempts || !should_retry(&err, retry, execution) {
                    return Err(err);
                }
                let delay = compute_delay(retry, attempt);
                wait_cancellable(delay, execution).await;
            }
        }
    }
}

fn should_retry(err: &FlowError, retry: &RetryConfig, execution: &mut Execution) -> bool {
    if retry.non_retryable.iter().any(|code| code == &err.code) {
        return false;
    }
    if let Some(when) = &retry.when {
        let serialized = serde_json::to_value(err).unwrap_or(Value::Null);
        execution.store.set("error", serialized);
        let result = super::expr::parse_and_eval(when, &execution.store);
        execution.store.remove("error");
        return matches!(result, Ok(value) if is_truthy(&value));
    }
    matches!(err.kind, FlowErrorKind::Transient)
}

fn compute_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let base = retry.delay_ms;
    let raw = match retry.backoff {
        Backoff::None => base,
        Backoff::Linear => base.saturating_mul(u64::from(attempt)),
        Backoff::Exponential => base.saturating_mul(1u64 << attempt.saturating_sub(1).min(62)),
    };
    let max_delay = if retry.max_delay_ms == 0 { u64::MAX } else { retry.max_delay_ms };
    let capped = raw.min(max_delay);

    let final_delay = if retry.jitter {
        let jitter_fraction: f64 = rand::random::<f64>() * 0.1;
        capped.saturating_add((capped as f64 * jitter_fraction) as u64)
    } else {
        capped
    };
    Duration::from_millis(final_delay)
}

async fn wait_cancellable(delay: Duration, execution: &Execution) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = execution.cancellation.cancelled() => {}
    }
}

/// §4.13.4 failure handling: unwind compensations LIFO on a detached
/// context, then give the flow-level error handler a chance to swallow or
/// replace the error.
async fn handle_failure(
    flow: &Flow,
    execution: &mut Execution,
    container: &Container,
    fe: FlowError,
) -> Result<(), FlowError> {
    run_compensations(flow, execution, container).await;

    match &flow.on_error_body {
        Some(on_error_step) => {
            execution.store.set("error", serde_json::to_value(&fe).unwrap_or(Value::Null));
            match step_executor::execute_body(on_error_step, flow, execution, container).await {
                Ok(_) => Ok(()),
                Err(replacement) => Err(replacement),
            }
        }
        None => Err(fe),
    }
}

async fn run_compensations(flow: &Flow, execution: &mut Execution, container: &Container) {
    // Compensations run detached from the flow's own cancellation so cleanup
    // completes even if the flow context was already cancelled.
    let flow_cancellation = std::mem::replace(&mut execution.cancellation, tokio_util::sync::CancellationToken::new());

    while let Some(entry) = execution.compensation_stack.pop() {
        if let Err(err) = step_executor::execute_body(&entry.body, flow, execution, container).await {
            log::error!(
                "compensation for step '{}' ({:?}) failed: {}",
                entry.step_id,
                entry.path,
                err
            );
        }
    }

    execution.cancellation = flow_cancellation;
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
