//! Agents backed by an external model CLI
//!
//! Each call is a one-shot process: the prompt goes in on stdin (or as an
//! argument when the configured args contain `{prompt}`), the answer comes
//! back on stdout and is read with [`super::protocol::parse_output`].

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use orchestrator::{Agent, AgentError, AgentResponse, Handoff, Role};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::prompts;
use super::protocol::{estimate_tokens, parse_output};
use crate::config::AgentCommand;

/// Maximum stdout kept from one call (256 KB)
const MAX_OUTPUT_BYTES: usize = 256 * 1024;

/// Maximum stderr quoted in an error message
const MAX_ERROR_BYTES: usize = 2 * 1024;

const PROMPT_PLACEHOLDER: &str = "{prompt}";
const MODEL_PLACEHOLDER: &str = "{model}";

/// Runs one role through a configured command
pub struct CommandAgent {
    role: Role,
    command: AgentCommand,
    system_prompt: String,
}

impl CommandAgent {
    /// Create an agent for `role`. The configured system prompt replaces
    /// the built-in one when set.
    pub fn new(role: Role, command: AgentCommand) -> Self {
        let system_prompt = command
            .system_prompt
            .clone()
            .or_else(|| prompts::system_prompt(role).map(str::to_string))
            .unwrap_or_default();
        Self {
            role,
            command,
            system_prompt,
        }
    }

    fn model_name(&self) -> String {
        self.command
            .model
            .clone()
            .unwrap_or_else(|| self.command.command.clone())
    }

    /// Arguments with placeholders filled in; the flag says whether the
    /// prompt was consumed by an argument
    fn arguments(&self, prompt: &str) -> (Vec<String>, bool) {
        let mut prompt_in_args = false;
        let model = self.command.model.clone().unwrap_or_default();
        let args = self
            .command
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PROMPT_PLACEHOLDER) {
                    prompt_in_args = true;
                }
                arg.replace(PROMPT_PLACEHOLDER, prompt)
                    .replace(MODEL_PLACEHOLDER, &model)
            })
            .collect();
        (args, prompt_in_args)
    }

    async fn run(&self, prompt: &str) -> Result<String, AgentError> {
        let (args, prompt_in_args) = self.arguments(prompt);
        debug!(role = %self.role, command = %self.command.command, args = args.len(), "Spawning agent command");

        let mut cmd = Command::new(&self.command.command);
        cmd.args(&args)
            .stdin(if prompt_in_args { Stdio::null() } else { Stdio::piped() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AgentError::Execution(format!("failed to start '{}': {}", self.command.command, e))
        })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(prompt.as_bytes()).await {
                    // The command may exit without reading its input
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        let output = output?;

        if !output.status.success() {
            let stderr = truncate_utf8(&output.stderr, MAX_ERROR_BYTES);
            let code = output.status.code().unwrap_or(-1);
            warn!(role = %self.role, exit_code = code, "Agent command exited with non-zero status");
            return Err(AgentError::Execution(format!(
                "'{}' exited with status {}: {}",
                self.command.command,
                code,
                stderr.trim()
            )));
        }

        Ok(truncate_utf8(&output.stdout, MAX_OUTPUT_BYTES))
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn role(&self) -> Role {
        self.role
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        handoff: Handoff,
    ) -> Result<AgentResponse, AgentError> {
        let start = Instant::now();
        let prompt = build_prompt(&self.system_prompt, &handoff);
        let timeout = self.command.timeout;

        // Dropping the run future drops the child, which kills it
        let stdout = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(timeout, self.run(&prompt)) => match result {
                Ok(stdout) => stdout?,
                Err(_) => return Err(AgentError::Timeout(timeout.as_secs())),
            },
        };

        if stdout.trim().is_empty() {
            return Err(AgentError::InvalidOutput(format!(
                "'{}' produced no output",
                self.command.command
            )));
        }

        let duration = start.elapsed();
        let tokens = estimate_tokens(&prompt) + estimate_tokens(&stdout);
        info!(
            role = %self.role,
            tokens,
            duration_ms = duration.as_millis() as u64,
            "Agent command completed"
        );

        Ok(parse_output(self.role, &stdout)
            .into_response(self.role)
            .with_tokens(tokens)
            .with_model(self.model_name())
            .with_duration(duration))
    }
}

/// Assemble the full prompt for a handoff: system prompt, the current
/// instruction, then whatever work products exist so far
pub fn build_prompt(system_prompt: &str, handoff: &Handoff) -> String {
    let mut sections = Vec::new();
    if !system_prompt.trim().is_empty() {
        sections.push(system_prompt.trim().to_string());
    }

    let context = &handoff.context;
    sections.push(format!("## Instruction\n{}", context.task_description.trim()));

    for (title, items) in [
        ("Requirements", &context.requirements),
        ("Constraints", &context.constraints),
        ("Files In Scope", &context.files_in_scope),
    ] {
        if !items.is_empty() {
            let list: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
            sections.push(format!("## {}\n{}", title, list.join("\n")));
        }
    }

    let artifacts = &handoff.artifacts;
    for (title, value) in [
        ("Design Document", &artifacts.design_doc),
        ("Current Code", &artifacts.code),
        ("Review Feedback", &artifacts.review_feedback),
        ("Notes", &artifacts.notes),
    ] {
        if let Some(text) = value {
            sections.push(format!("## {}\n{}", title, text.trim()));
        }
    }

    sections.push(format!(
        "You are the {}. The previous step was done by the {}.",
        handoff.to_role, handoff.from_role
    ));

    sections.join("\n\n")
}

/// Truncate a byte slice to valid UTF-8 within the given byte limit.
fn truncate_utf8(bytes: &[u8], max_bytes: usize) -> String {
    let s = String::from_utf8_lossy(bytes);
    if s.len() <= max_bytes {
        return s.into_owned();
    }
    let truncated: String = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max_bytes)
        .map(|(_, c)| c)
        .collect();
    format!("{}\n[truncated: {} total bytes]", truncated, bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use orchestrator::{Artifacts, Context, NextRole};

    fn shell(script: &str, timeout: Duration) -> AgentCommand {
        AgentCommand {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout,
            model: None,
            system_prompt: None,
        }
    }

    fn handoff(to: Role) -> Handoff {
        let mut artifacts = Artifacts::default();
        artifacts.design_doc = Some("# Design\nA bounded cache.".to_string());
        let mut context = Context::new("Implement the cache");
        context.constraints.push("no unsafe".to_string());
        Handoff::new("t1", Role::Architect, to, context, artifacts)
    }

    #[test]
    fn test_build_prompt_sections() {
        let prompt = build_prompt("SYSTEM", &handoff(Role::Implementer));
        assert!(prompt.starts_with("SYSTEM"));
        assert!(prompt.contains("## Instruction\nImplement the cache"));
        assert!(prompt.contains("## Constraints\n- no unsafe"));
        assert!(prompt.contains("## Design Document\n# Design"));
        assert!(!prompt.contains("## Current Code"));
        assert!(prompt.contains("You are the implementer"));
    }

    #[test]
    fn test_arguments_placeholders() {
        let mut command = shell("x", Duration::from_secs(1));
        command.args = vec!["-m".into(), "{model}".into(), "{prompt}".into()];
        command.model = Some("big".to_string());
        let agent = CommandAgent::new(Role::Architect, command);

        let (args, in_args) = agent.arguments("hello");
        assert_eq!(args, vec!["-m", "big", "hello"]);
        assert!(in_args);
        assert_eq!(agent.model_name(), "big");
    }

    #[test]
    fn test_custom_system_prompt() {
        let mut command = shell("x", Duration::from_secs(1));
        command.system_prompt = Some("Only reply LGTM".to_string());
        let agent = CommandAgent::new(Role::Reviewer, command);
        assert_eq!(agent.system_prompt, "Only reply LGTM");

        let agent = CommandAgent::new(Role::Reviewer, shell("x", Duration::from_secs(1)));
        assert!(agent.system_prompt.contains("VERDICT:"));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8(b"hello", 100), "hello");
        let text = "é".repeat(10);
        let truncated = truncate_utf8(text.as_bytes(), 5);
        assert!(truncated.starts_with("éé"));
        assert!(truncated.contains("[truncated: 20 total bytes]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_executes_and_parses_output() {
        // Reads the prompt from stdin and echoes part of it back
        let script = r#"read -r first; grep -q "Implement the cache" && printf '```rust\nfn get() {}\n```\nNEXT: reviewer\n'"#;
        let agent = CommandAgent::new(
            Role::Implementer,
            shell(script, Duration::from_secs(10)),
        );

        let response = agent
            .execute(&CancellationToken::new(), handoff(Role::Implementer))
            .await
            .unwrap();

        assert_eq!(response.next, NextRole::Continue(Role::Reviewer));
        assert_eq!(response.artifacts["code"], "fn get() {}");
        assert!(response.tokens_used > 0);
        assert_eq!(response.model, "sh");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let agent = CommandAgent::new(
            Role::Architect,
            shell("cat >/dev/null; echo boom >&2; exit 3", Duration::from_secs(10)),
        );
        let err = agent
            .execute(&CancellationToken::new(), handoff(Role::Architect))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("status 3"), "{}", message);
        assert!(message.contains("boom"), "{}", message);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_is_invalid() {
        let agent = CommandAgent::new(
            Role::Architect,
            shell("cat >/dev/null", Duration::from_secs(10)),
        );
        let err = agent
            .execute(&CancellationToken::new(), handoff(Role::Architect))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let agent = CommandAgent::new(
            Role::Architect,
            shell("sleep 30", Duration::from_secs(1)),
        );
        let err = agent
            .execute(&CancellationToken::new(), handoff(Role::Architect))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_command() {
        let agent = CommandAgent::new(
            Role::Architect,
            shell("sleep 30", Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = agent.execute(&cancel, handoff(Role::Architect)).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let command = AgentCommand {
            command: "definitely-not-a-real-agent-binary".to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(5),
            model: None,
            system_prompt: None,
        };
        let agent = CommandAgent::new(Role::Navigator, command);
        let err = agent
            .execute(&CancellationToken::new(), handoff(Role::Navigator))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
