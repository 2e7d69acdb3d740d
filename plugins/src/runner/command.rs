use std::fmt::Write as _;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parawave_core::catalog::TaskSpec;
use parawave_core::config::{CommandRunnerConfig, StdinFormat};
use parawave_core::error::TaskError;
use parawave_core::executor::traits::{TaskContext, TaskRunner};
use parawave_core::executor::types::TaskOutput;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const STDERR_TAIL_BYTES: usize = 2_000;

/// Spawns the configured command once per task attempt.
///
/// The task goes in on stdin (a prompt or a JSON request) and a `TaskOutput`
/// envelope is read back from stdout. The child is killed when the attempt is
/// cancelled or its future is dropped.
pub struct CommandRunnerPlugin {
    config: CommandRunnerConfig,
}

impl CommandRunnerPlugin {
    pub fn new(config: CommandRunnerConfig) -> Self {
        Self { config }
    }

    async fn run_child(&self, input: String, ctx: &TaskContext) -> Result<std::process::Output> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.config.program))?;

        // Feed stdin while stdout drains, or a child that echoes fills its pipe and stalls.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(input.as_bytes()).await {
                Ok(()) => stdin.shutdown().await.or_else(ignore_broken_pipe),
                Err(e) => ignore_broken_pipe(e),
            }
        };
        let collect = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed.context("failed to write task input")?;
            output.context("failed to collect child output")
        };

        tokio::select! {
            output = collect => output,
            _ = ctx.cancel.cancelled() => anyhow::bail!("cancelled while running"),
        }
    }
}

#[async_trait]
impl TaskRunner for CommandRunnerPlugin {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
        let input = match self.config.stdin_format {
            StdinFormat::Prompt => render_prompt(task, ctx),
            StdinFormat::Json => request_json(task, ctx).to_string(),
        };

        tracing::debug!(task_id = %task.id, program = %self.config.program, attempt = ctx.attempt, "spawning task command");
        let output = match self.run_child(input, ctx).await {
            Ok(output) => output,
            Err(_) if ctx.cancel.is_cancelled() => return Err(TaskError::cancelled("command runner stopped")),
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TaskError::execution(format!(
                "'{}' exited with {}: {}",
                self.config.program,
                output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                tail(stderr.trim(), STDERR_TAIL_BYTES)
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// A child that exits without reading all of its input is judged by its exit status.
fn ignore_broken_pipe(e: std::io::Error) -> std::io::Result<()> {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        Ok(())
    } else {
        Err(e)
    }
}

fn request_json(task: &TaskSpec, ctx: &TaskContext) -> Value {
    json!({
        "run_id": ctx.run_id,
        "wave": ctx.wave,
        "attempt": ctx.attempt,
        "task": task,
        "upstream": ctx.upstream,
    })
}

fn render_prompt(task: &TaskSpec, ctx: &TaskContext) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Task: {} (domain: {})", task.id, task.domain);
    if !task.description.is_empty() {
        let _ = writeln!(prompt, "{}", task.description);
    }
    match &task.instruction {
        Value::Null => {}
        Value::String(s) => {
            let _ = writeln!(prompt, "\n{}", s);
        }
        other => {
            let _ = writeln!(prompt, "\n{}", serde_json::to_string_pretty(other).unwrap_or_default());
        }
    }
    if !ctx.upstream.is_empty() {
        let _ = writeln!(prompt, "\nResults from earlier tasks:");
        for (id, output) in &ctx.upstream {
            let _ = writeln!(prompt, "- {}: {}", id, output.summary);
        }
    }
    prompt.push_str(
        "\nRespond with a single JSON object with the fields \"summary\", \"claims\" \
         (claim name to content), \"constraints\" ([{\"claim\", \"allowed\", \"reason\"}]) and \
         \"findings\" ([{\"key\", \"title\", \"detail\", \"impact\", \"probability\", \"value\", \
         \"effort\", \"depends_on\"}]).\n",
    );
    prompt
}

/// Interpret stdout: a `TaskOutput` document, an envelope whose `result`
/// string holds one, or free text used as the summary.
fn parse_output(stdout: &str) -> TaskOutput {
    let trimmed = stdout.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => {
            if let Some(Value::String(inner)) = obj.get("result") {
                return parse_output(strip_code_fence(inner));
            }
            serde_json::from_value(Value::Object(obj)).unwrap_or_else(|_| TaskOutput::with_summary(trimmed))
        }
        _ => TaskOutput::with_summary(trimmed),
    }
}

fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    let Some(body) = s.strip_prefix("```") else {
        return s;
    };
    let body = body.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> TaskContext {
        let mut upstream = BTreeMap::new();
        upstream.insert("security".to_string(), TaskOutput::with_summary("two high risks"));
        TaskContext {
            run_id: "run".into(),
            wave: 1,
            attempt: 1,
            upstream,
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_parse_plain_envelope() {
        let out = parse_output(r#"{"summary": "ok", "claims": {"auth": "oauth2"}}"#);
        assert_eq!(out.summary, "ok");
        assert_eq!(out.claims["auth"], "oauth2");
    }

    #[test]
    fn test_parse_nested_result_with_fence() {
        let stdout = json!({
            "type": "result",
            "result": "```json\n{\"summary\": \"nested\"}\n```"
        })
        .to_string();
        assert_eq!(parse_output(&stdout).summary, "nested");
    }

    #[test]
    fn test_parse_free_text() {
        assert_eq!(parse_output("  just words \n").summary, "just words");
    }

    #[test]
    fn test_prompt_includes_upstream_summaries() {
        let task = TaskSpec::new("synthesis", "Merge findings").with_instruction(json!("Prioritize"));
        let prompt = render_prompt(&task, &ctx());
        assert!(prompt.starts_with("Task: synthesis (domain: general)"));
        assert!(prompt.contains("Prioritize"));
        assert!(prompt.contains("- security: two high risks"));
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("héllo", 4), "llo");
        assert_eq!(tail("abc", 10), "abc");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_reads_stdout() {
        let runner = CommandRunnerPlugin::new(CommandRunnerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), r#"cat >/dev/null; echo '{"summary":"from child"}'"#.into()],
            env: BTreeMap::new(),
            stdin_format: StdinFormat::Json,
        });
        let out = runner.execute(&TaskSpec::new("a", ""), &ctx()).await.unwrap();
        assert_eq!(out.summary, "from child");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_reports_exit_code() {
        let runner = CommandRunnerPlugin::new(CommandRunnerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), "cat >/dev/null; echo broken >&2; exit 3".into()],
            env: BTreeMap::new(),
            stdin_format: StdinFormat::Prompt,
        });
        let err = runner.execute(&TaskSpec::new("a", ""), &ctx()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exited with 3"), "{msg}");
        assert!(msg.contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_streams_large_echo() {
        let runner = CommandRunnerPlugin::new(CommandRunnerConfig {
            program: "cat".into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stdin_format: StdinFormat::Prompt,
        });
        let payload = "x".repeat(512 * 1024);
        let task = TaskSpec::new("bulk", "").with_instruction(json!(payload.clone()));

        let out = tokio::time::timeout(std::time::Duration::from_secs(10), runner.execute(&task, &ctx()))
            .await
            .expect("echoing child should not stall")
            .unwrap();
        assert!(out.summary.contains(&payload));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_ignores_unread_input() {
        let runner = CommandRunnerPlugin::new(CommandRunnerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), r#"echo '{"summary":"did not read"}'"#.into()],
            env: BTreeMap::new(),
            stdin_format: StdinFormat::Prompt,
        });
        let task = TaskSpec::new("quick", "").with_instruction(json!("y".repeat(512 * 1024)));
        let out = runner.execute(&task, &ctx()).await.unwrap();
        assert_eq!(out.summary, "did not read");
    }
}
