//! Canned unit callbacks for exercising the scheduler without real work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::Value;

use agentdag::exec::{UnitCallback, UnitInput, UnitResult, unit_fn};

/// Shared, ordered log of unit ids as they finish.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, unit: &str) {
        self.entries.lock().push(unit.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, unit: &str) -> usize {
        self.entries.lock().iter().filter(|u| *u == unit).count()
    }

    /// Position of `unit` in the log. Panics if it never ran.
    pub fn position(&self, unit: &str) -> usize {
        self.entries()
            .iter()
            .position(|u| u == unit)
            .unwrap_or_else(|| panic!("unit '{unit}' never ran"))
    }
}

/// Returns `value` after an optional delay and records itself in `log`.
pub fn fixed_unit(value: Value, delay: Duration, log: ExecutionLog) -> UnitCallback {
    unit_fn(move |input: UnitInput| {
        let value = value.clone();
        let log = log.clone();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            log.push(&input.unit_id);
            Ok(UnitResult::new(value))
        }
    })
}

/// Returns `"<unit_id>:done"`.
pub fn echo_unit(log: ExecutionLog) -> UnitCallback {
    unit_fn(move |input: UnitInput| {
        let log = log.clone();
        async move {
            log.push(&input.unit_id);
            Ok(UnitResult::new(format!("{}:done", input.unit_id)))
        }
    })
}

/// Always fails with `message`.
pub fn failing_unit(message: &str, log: ExecutionLog) -> UnitCallback {
    let message = message.to_string();
    unit_fn(move |input: UnitInput| {
        let message = message.clone();
        let log = log.clone();
        async move {
            log.push(&input.unit_id);
            Err::<UnitResult, _>(anyhow!(message))
        }
    })
}

/// Counts invocations in `counter` and returns the count it observed.
pub fn counting_unit(counter: Arc<AtomicUsize>) -> UnitCallback {
    unit_fn(move |_input: UnitInput| {
        let counter = Arc::clone(&counter);
        async move {
            let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(UnitResult::new(seen as u64))
        }
    })
}

/// Tracks how many callbacks run at once; `peak` holds the maximum seen.
pub fn concurrency_probe(
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    hold: Duration,
) -> UnitCallback {
    unit_fn(move |input: UnitInput| {
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(UnitResult::new(input.unit_id))
        }
    })
}

/// Concatenates the upstream outputs named in `parts` with `:`, returning
/// `prefix` first. Missing parts fail the unit.
pub fn join_unit(prefix: &str, parts: &[&str], log: ExecutionLog) -> UnitCallback {
    let prefix = prefix.to_string();
    let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
    unit_fn(move |input: UnitInput| {
        let prefix = prefix.clone();
        let parts = parts.clone();
        let log = log.clone();
        async move {
            let mut out = vec![prefix];
            for part in &parts {
                let value = input
                    .get_str(part)
                    .ok_or_else(|| anyhow!("missing input '{part}'"))?;
                out.push(value.to_string());
            }
            log.push(&input.unit_id);
            Ok(UnitResult::new(out.join(":")))
        }
    })
}
