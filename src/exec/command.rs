// src/exec/command.rs

//! `cmd` units: run a shell command with the unit input as JSON on stdin.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::context::UnitInput;
use crate::exec::{UnitCallback, UnitResult, unit_fn};

/// Build a callback that runs `cmd` through the platform shell.
///
/// - stdin: the unit's input `data` as a JSON object
/// - stdout: trimmed, becomes the output; a JSON object with an `output`
///   key is unwrapped and its other keys become metadata
/// - non-zero exit: unit failure carrying stderr
pub fn command_unit(cmd: impl Into<String>) -> UnitCallback {
    let cmd = cmd.into();
    unit_fn(move |input| {
        let cmd = cmd.clone();
        async move { run_command(&cmd, input).await }
    })
}

async fn run_command(cmd: &str, input: UnitInput) -> Result<UnitResult> {
    info!(unit = %input.unit_id, cmd = %cmd, "starting unit process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .env("AGENTDAG_UNIT", &input.unit_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for unit '{}'", input.unit_id))?;

    let payload = serde_json::to_vec(&input.to_value())?;

    // Feed stdin concurrently so a chatty child cannot deadlock on a full pipe.
    let writer = child.stdin.take().map(|mut stdin| {
        let unit = input.unit_id.clone();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&payload).await {
                // Commands that ignore stdin close it early.
                debug!(unit = %unit, error = %e, "stdin not fully consumed");
            }
        })
    });

    let out = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for process of unit '{}'", input.unit_id))?;

    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            warn!(unit = %input.unit_id, error = %e, "stdin writer task failed");
        }
    }

    let code = out.status.code().unwrap_or(-1);
    info!(
        unit = %input.unit_id,
        exit_code = code,
        success = out.status.success(),
        "unit process exited"
    );

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("command exited with code {code}: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    Ok(parse_stdout(stdout))
}

fn parse_stdout(stdout: String) -> UnitResult {
    if let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(&stdout) {
        if let Some(output) = obj.remove("output") {
            return UnitResult {
                output,
                metadata: obj,
            };
        }
    }
    UnitResult::new(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_stdout_becomes_string_output() {
        let result = parse_stdout("hello".to_string());
        assert_eq!(result.output, json!("hello"));
        assert!(result.metadata.is_empty());
    }

    #[test]
    fn json_envelope_is_unwrapped() {
        let result = parse_stdout(r#"{"output": {"total": 3}, "model": "x"}"#.to_string());
        assert_eq!(result.output, json!({"total": 3}));
        assert_eq!(result.metadata.get("model"), Some(&json!("x")));
    }

    #[test]
    fn json_without_output_key_is_kept_verbatim() {
        let raw = r#"{"total": 3}"#.to_string();
        let result = parse_stdout(raw.clone());
        assert_eq!(result.output, json!(raw));
    }
}
