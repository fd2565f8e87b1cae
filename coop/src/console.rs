//! Line-oriented operator console
//!
//! While a workflow runs, each line the operator types is either a control
//! signal (`pause`, `resume`, `step`, `skip`, `kill`) or, when the human
//! role has asked a question, the answer to that question.

use std::io::BufRead;
use std::sync::Arc;

use orchestrator::{ControlSignal, Decision, DecisionRequest, HookController};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::output::{OutputEvent, OutputWriter};

const SIGNAL_HELP: &str =
    "commands: p/pause  r/resume  n/step  s/skip  k/kill  h/help";

const DECISION_HELP: &str = "[y]es / [n]o / [e]dit / note TEXT";

/// Reason recorded when the operator kills a run
pub const OPERATOR_KILL_REASON: &str = "killed by operator";

/// Read stdin lines on a dedicated thread
///
/// Blocking stdin reads must not live on the runtime, or shutdown waits for
/// the next line. The thread ends at EOF or when the receiver is dropped.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// How an answer line was understood
#[derive(Debug, Clone, PartialEq, Eq)]
enum Answer {
    Decided(Decision),
    /// Operator wants to type changes
    Edit,
    Invalid,
}

fn parse_answer(line: &str) -> Answer {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();
    match lower.as_str() {
        "y" | "yes" | "" => Answer::Decided(Decision::Approved),
        "n" | "no" => Answer::Decided(Decision::Rejected),
        "e" | "edit" => Answer::Edit,
        s if s.starts_with("note ") => {
            Answer::Decided(Decision::ApprovedWithNote(trimmed[5..].trim().to_string()))
        }
        _ => Answer::Invalid,
    }
}

pub struct Console {
    lines: mpsc::Receiver<String>,
    input_open: bool,
    hooks: Arc<HookController>,
    output: Arc<dyn OutputWriter>,
}

impl Console {
    pub fn new(
        lines: mpsc::Receiver<String>,
        hooks: Arc<HookController>,
        output: Arc<dyn OutputWriter>,
    ) -> Self {
        Self {
            lines,
            input_open: true,
            hooks,
            output,
        }
    }

    /// Serve operator input until `cancel` fires
    ///
    /// `decisions` is `None` when the human role never asks (auto-approve).
    pub async fn run(
        mut self,
        decisions: Option<mpsc::Receiver<DecisionRequest>>,
        cancel: CancellationToken,
    ) {
        let (mut decisions, mut decisions_open) = match decisions {
            Some(rx) => (rx, true),
            None => (mpsc::channel(1).1, false),
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = decisions.recv(), if decisions_open => match request {
                    Some(request) => self.decide(request, &cancel).await,
                    None => decisions_open = false,
                },
                line = self.lines.recv(), if self.input_open => match line {
                    Some(line) => self.command(&line),
                    None => {
                        tracing::debug!("Operator input closed");
                        self.input_open = false;
                    }
                },
            }
        }
    }

    async fn next_line(&mut self, cancel: &CancellationToken) -> Option<String> {
        if !self.input_open {
            return None;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            line = self.lines.recv() => {
                if line.is_none() {
                    self.input_open = false;
                }
                line
            }
        }
    }

    fn command(&self, line: &str) {
        let input = line.trim();
        if input.is_empty() {
            return;
        }
        if matches!(input, "h" | "help" | "?") {
            self.output.write(OutputEvent::Status(SIGNAL_HELP.to_string()));
            return;
        }

        match input.parse::<ControlSignal>() {
            Ok(ControlSignal::Kill) => {
                self.hooks
                    .send_signal_with_reason(ControlSignal::Kill, Some(OPERATOR_KILL_REASON.to_string()));
                self.output.write(OutputEvent::Status("kill requested".to_string()));
            }
            Ok(signal) => {
                self.hooks.send_signal(signal);
                self.output.write(OutputEvent::Status(format!("{} requested", signal)));
            }
            Err(e) => self
                .output
                .write(OutputEvent::Warning(format!("{} ({})", e, SIGNAL_HELP))),
        }
    }

    async fn decide(&mut self, request: DecisionRequest, cancel: &CancellationToken) {
        self.output.write(OutputEvent::Heading("Checkpoint".to_string()));
        if let Some(content) = &request.content {
            self.output.write(OutputEvent::Text(content.clone()));
        }
        self.output
            .write(OutputEvent::Prompt(format!("{} {}", request.message, DECISION_HELP)));
        self.output.flush();

        let decision = match self.next_line(cancel).await {
            None => {
                self.output.write(OutputEvent::Warning(
                    "No operator input available, rejecting".to_string(),
                ));
                Decision::Rejected
            }
            Some(line) => match parse_answer(&line) {
                Answer::Decided(decision) => decision,
                Answer::Edit => {
                    self.output.write(OutputEvent::Prompt(
                        "Enter your changes (end with an empty line):".to_string(),
                    ));
                    self.output.flush();
                    let mut edits = Vec::new();
                    while let Some(line) = self.next_line(cancel).await {
                        if line.trim().is_empty() {
                            break;
                        }
                        edits.push(line);
                    }
                    Decision::Edit(edits.join("\n"))
                }
                Answer::Invalid => {
                    self.output.write(OutputEvent::Warning(
                        "Invalid input, treating as rejection".to_string(),
                    ));
                    Decision::Rejected
                }
            },
        };

        if !request.respond(decision) {
            tracing::debug!("Decision arrived after the workflow stopped waiting");
        }
    }
}
