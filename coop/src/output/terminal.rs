//! Terminal output with colors and formatting
//!
//! Uses ANSI escape codes for colors and styling. Content goes to stdout;
//! status, progress and checkpoints go to stderr.

use std::io::{self, Write};

use orchestrator::Role;

use super::{checkpoint_help, preview, OutputEvent, OutputWriter};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

/// Lines of code shown when the code artifact changes
const CODE_PREVIEW_LINES: usize = 12;

/// Terminal output writer with colors and formatting
pub struct TerminalOutput {
    use_colors: bool,
    verbose: bool,
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors() -> Self {
        Self {
            use_colors: false,
            verbose: false,
        }
    }

    /// Show every checkpoint and full code previews
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Format with color if colors are enabled
    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    /// Format with multiple styles
    fn styled(&self, codes: &[&str], text: &str) -> String {
        if self.use_colors {
            let prefix: String = codes.iter().copied().collect();
            format!("{}{}{}", prefix, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn role(&self, role: Role) -> String {
        let code = match role {
            Role::Architect => MAGENTA,
            Role::Implementer => BLUE,
            Role::Reviewer => YELLOW,
            Role::Navigator => CYAN,
            Role::Human => GREEN,
        };
        self.styled(&[BOLD, code], role.as_str())
    }

    /// Render an event to a line of text (without printing it)
    fn format(&self, event: &OutputEvent) -> String {
        match event {
            OutputEvent::Text(text) => text.clone(),

            OutputEvent::Heading(title) => self.styled(&[BOLD, CYAN], &format!("== {} ==", title)),

            OutputEvent::Progress { message, percent } => format!(
                "  {} {} {}",
                self.color(BLUE, "⋯"),
                self.color(GRAY, &format!("[{:>3}%]", percent)),
                message
            ),

            OutputEvent::Handoff { from, to, reason } => {
                let target = match to.role() {
                    Some(role) => self.role(role),
                    None => self.styled(&[BOLD, GREEN], "done"),
                };
                let reason = if reason.is_empty() {
                    String::new()
                } else {
                    format!(" {}", self.color(GRAY, &format!("({})", reason)))
                };
                format!("  {} → {}{}", self.role(*from), target, reason)
            }

            OutputEvent::Tokens { role, tokens, total } => self.color(
                GRAY,
                &format!("  {} used {} tokens (total {})", role, tokens, total),
            ),

            OutputEvent::Code { role, code } => {
                let lines = code.lines().count();
                let header = format!(
                    "  {} {} updated the code ({} lines)",
                    self.color(GREEN, "✎"),
                    self.role(*role),
                    lines
                );
                if self.verbose {
                    format!("{}\n{}", header, self.color(DIM, code))
                } else {
                    format!(
                        "{}\n{}",
                        header,
                        self.color(DIM, &preview(code, CODE_PREVIEW_LINES))
                    )
                }
            }

            OutputEvent::Checkpoint {
                phase,
                role,
                paused,
                can_skip,
            } => {
                if *paused {
                    format!(
                        "{} at {} for {}  {}",
                        self.styled(&[BOLD, YELLOW], "⏸ Paused"),
                        phase,
                        self.role(*role),
                        self.color(GRAY, checkpoint_help(*can_skip))
                    )
                } else {
                    self.color(GRAY, &format!("  · {} ({})", phase, role))
                }
            }

            OutputEvent::Prompt(question) => {
                format!("{} {}", self.styled(&[BOLD, CYAN], "?"), question)
            }

            OutputEvent::Status(msg) => self.color(GRAY, &format!("  {}", msg)),

            OutputEvent::Success(msg) => format!(
                "{} {}",
                self.color(GREEN, "✓"),
                self.styled(&[BOLD, GREEN], msg)
            ),

            OutputEvent::Error(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, RED], "Error:"),
                self.color(RED, msg)
            ),

            OutputEvent::Warning(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, YELLOW], "Warning:"),
                self.color(YELLOW, msg)
            ),

            OutputEvent::NewLine => String::new(),
        }
    }

    /// Whether an event is shown at all
    fn visible(&self, event: &OutputEvent) -> bool {
        match event {
            OutputEvent::Checkpoint { paused, .. } => *paused || self.verbose,
            OutputEvent::Tokens { .. } => self.verbose,
            _ => true,
        }
    }
}

impl OutputWriter for TerminalOutput {
    fn write(&self, event: OutputEvent) {
        if !self.visible(&event) {
            return;
        }
        let line = self.format(&event);
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

    fn supports_colors(&self) -> bool {
        self.use_colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::{HookPhase, NextRole};

    #[test]
    fn test_color_formatting() {
        let output = TerminalOutput::new();
        let colored = output.color(RED, "test");
        assert!(colored.contains("\x1b[31m"));
        assert!(colored.contains("\x1b[0m"));

        let output = TerminalOutput::without_colors();
        assert_eq!(output.color(RED, "test"), "test");
        assert!(!output.supports_colors());
    }

    #[test]
    fn test_handoff_line() {
        let output = TerminalOutput::without_colors();
        let line = output.format(&OutputEvent::Handoff {
            from: Role::Reviewer,
            to: NextRole::Continue(Role::Implementer),
            reason: "changes requested".to_string(),
        });
        assert_eq!(line, "  reviewer → implementer (changes requested)");

        let line = output.format(&OutputEvent::Handoff {
            from: Role::Reviewer,
            to: NextRole::Done,
            reason: String::new(),
        });
        assert_eq!(line, "  reviewer → done");
    }

    #[test]
    fn test_checkpoint_visibility() {
        let paused = OutputEvent::Checkpoint {
            phase: HookPhase::PreAgent,
            role: Role::Implementer,
            paused: true,
            can_skip: true,
        };
        let passing = OutputEvent::Checkpoint {
            phase: HookPhase::PreAgent,
            role: Role::Implementer,
            paused: false,
            can_skip: true,
        };

        let output = TerminalOutput::without_colors();
        assert!(output.visible(&paused));
        assert!(!output.visible(&passing));
        assert!(output.format(&paused).contains("[s]kip agent"));

        let verbose = TerminalOutput::without_colors().with_verbose(true);
        assert!(verbose.visible(&passing));
    }

    #[test]
    fn test_code_preview_is_truncated() {
        let code: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let output = TerminalOutput::without_colors();
        let text = output.format(&OutputEvent::Code {
            role: Role::Implementer,
            code: code.clone(),
        });
        assert!(text.contains("(30 lines)"));
        assert!(text.contains("18 more lines"));

        let verbose = TerminalOutput::without_colors().with_verbose(true);
        let text = verbose.format(&OutputEvent::Code {
            role: Role::Implementer,
            code,
        });
        assert!(text.contains("line 29"));
    }
}
