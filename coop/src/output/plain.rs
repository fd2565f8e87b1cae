//! Plain text output for pipes and CI environments
//!
//! No colors or special formatting, one event per line.

use std::io::{self, Write};

use super::{checkpoint_help, OutputEvent, OutputWriter};

/// Plain text output writer (no colors)
pub struct PlainOutput {
    verbose: bool,
}

impl Default for PlainOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl PlainOutput {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn format(&self, event: &OutputEvent) -> Option<String> {
        let line = match event {
            OutputEvent::Text(text) => text.clone(),
            OutputEvent::Heading(title) => format!("== {} ==", title),
            OutputEvent::Progress { message, percent } => format!("[{:>3}%] {}", percent, message),
            OutputEvent::Handoff { from, to, reason } if reason.is_empty() => {
                format!("handoff: {} -> {}", from, to)
            }
            OutputEvent::Handoff { from, to, reason } => {
                format!("handoff: {} -> {} ({})", from, to, reason)
            }
            OutputEvent::Tokens { role, tokens, total } if self.verbose => {
                format!("tokens: {} {} (total {})", role, tokens, total)
            }
            OutputEvent::Tokens { .. } => return None,
            OutputEvent::Code { role, code } if self.verbose => {
                format!("code from {}:\n{}", role, code)
            }
            OutputEvent::Code { role, code } => {
                format!("code: {} updated ({} lines)", role, code.lines().count())
            }
            OutputEvent::Checkpoint {
                phase,
                role,
                paused: true,
                can_skip,
            } => format!("PAUSED at {} for {}  {}", phase, role, checkpoint_help(*can_skip)),
            OutputEvent::Checkpoint { phase, role, .. } if self.verbose => {
                format!("checkpoint: {} ({})", phase, role)
            }
            OutputEvent::Checkpoint { .. } => return None,
            OutputEvent::Prompt(question) => format!("? {}", question),
            OutputEvent::Status(msg) => msg.clone(),
            OutputEvent::Success(msg) => format!("OK: {}", msg),
            OutputEvent::Error(msg) => format!("Error: {}", msg),
            OutputEvent::Warning(msg) => format!("Warning: {}", msg),
            OutputEvent::NewLine => String::new(),
        };
        Some(line)
    }
}

impl OutputWriter for PlainOutput {
    fn write(&self, event: OutputEvent) {
        let Some(line) = self.format(&event) else {
            return;
        };
        match event {
            OutputEvent::Text(_) | OutputEvent::Heading(_) | OutputEvent::NewLine => {
                println!("{}", line)
            }
            _ => eprintln!("{}", line),
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}
