// src/exec/runner.rs

//! Runs a single unit callback.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::context::UnitInput;
use crate::exec::{UnitCallback, is_empty_output};
use crate::types::{UnitId, UnitOutcome};

/// Invoke `callback` with `input` and report the outcome.
///
/// Never fails: callback errors, panics and empty outputs all become
/// [`UnitOutcome::Failed`]. The callback runs in its own Tokio task so a
/// panic is contained there.
///
/// If `limiter` is set, a permit is held for the duration of the callback.
pub async fn run_unit(
    input: UnitInput,
    callback: UnitCallback,
    limiter: Option<Arc<Semaphore>>,
) -> (UnitId, UnitOutcome) {
    let unit = input.unit_id.clone();

    let _permit = match limiter {
        Some(sem) => match sem.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                return (unit, UnitOutcome::Failed("in-flight limiter closed".to_string()));
            }
        },
        None => None,
    };

    info!(unit = %unit, keys = input.data.len(), "executing unit");
    let started = Instant::now();

    let outcome = match tokio::spawn(callback(input)).await {
        Ok(Ok(result)) if is_empty_output(&result.output) => {
            UnitOutcome::Failed("unit returned an empty output".to_string())
        }
        Ok(Ok(result)) => UnitOutcome::Success(result.output),
        Ok(Err(err)) => UnitOutcome::Failed(format!("{err:#}")),
        Err(join_err) if join_err.is_panic() => {
            UnitOutcome::Failed("unit callback panicked".to_string())
        }
        Err(join_err) => UnitOutcome::Failed(format!("unit callback aborted: {join_err}")),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        UnitOutcome::Success(_) => debug!(unit = %unit, elapsed_ms, "unit callback returned"),
        UnitOutcome::Failed(message) => {
            error!(unit = %unit, elapsed_ms, error = %message, "unit callback failed")
        }
    }

    (unit, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{UnitResult, unit_fn};
    use serde_json::{Map, json};
    use std::collections::BTreeMap;

    fn input(unit: &str) -> UnitInput {
        UnitInput {
            unit_id: unit.to_string(),
            data: Map::new(),
            upstream: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn success_carries_output() {
        let cb = unit_fn(|_| async { Ok(UnitResult::new("done")) });
        let (unit, outcome) = run_unit(input("a"), cb, None).await;
        assert_eq!(unit, "a");
        assert_eq!(outcome, UnitOutcome::Success(json!("done")));
    }

    #[tokio::test]
    async fn errors_and_empty_outputs_become_failures() {
        let cb = unit_fn(|_| async { Err::<UnitResult, _>(anyhow::anyhow!("llm unavailable")) });
        let (_, outcome) = run_unit(input("a"), cb, None).await;
        assert_eq!(outcome, UnitOutcome::Failed("llm unavailable".to_string()));

        let cb = unit_fn(|_| async { Ok(UnitResult::new("   ")) });
        let (_, outcome) = run_unit(input("a"), cb, None).await;
        assert!(matches!(outcome, UnitOutcome::Failed(msg) if msg.contains("empty")));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let cb = unit_fn(|input: UnitInput| async move {
            if input.unit_id == "a" {
                panic!("boom");
            }
            Ok(UnitResult::new("unreachable"))
        });
        let (_, outcome) = run_unit(input("a"), cb, None).await;
        assert!(matches!(outcome, UnitOutcome::Failed(msg) if msg.contains("panicked")));
    }

    #[tokio::test]
    async fn closed_limiter_fails_the_unit() {
        let sem = Arc::new(Semaphore::new(1));
        sem.close();
        let cb = unit_fn(|_| async { Ok(UnitResult::new("x")) });
        let (_, outcome) = run_unit(input("a"), cb, Some(sem)).await;
        assert!(matches!(outcome, UnitOutcome::Failed(_)));
    }
}
