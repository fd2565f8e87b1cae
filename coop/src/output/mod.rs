//! Output abstraction for the CLI
//!
//! Workflow telemetry is turned into [`OutputEvent`]s and handed to an
//! [`OutputWriter`]. The terminal writer adds colors; the plain writer is
//! used for pipes and CI.

use orchestrator::{HookPhase, NextRole, Role};

mod plain;
mod render;
mod terminal;

pub use plain::PlainOutput;
pub use render::{render_events, RenderSummary};
pub use terminal::TerminalOutput;

// ============================================================================
// Output Events
// ============================================================================

/// Events that can be displayed to the user
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Plain text content (stdout)
    Text(String),

    /// Section title
    Heading(String),

    /// Coarse run progress
    Progress { message: String, percent: u8 },

    /// Control moved between roles
    Handoff {
        from: Role,
        to: NextRole,
        reason: String,
    },

    /// Tokens used by one agent call
    Tokens { role: Role, tokens: u64, total: u64 },

    /// The code artifact changed
    Code { role: Role, code: String },

    /// A hook checkpoint was reached
    Checkpoint {
        phase: HookPhase,
        role: Role,
        paused: bool,
        can_skip: bool,
    },

    /// Question for the operator
    Prompt(String),

    /// Status message (informational)
    Status(String),

    /// Something finished well
    Success(String),

    Error(String),

    Warning(String),

    /// New line / separator
    NewLine,
}

// ============================================================================
// Output Writer Trait
// ============================================================================

/// Trait for writing output events
pub trait OutputWriter: Send + Sync {
    /// Write an output event
    fn write(&self, event: OutputEvent);

    /// Flush any buffered output
    fn flush(&self);

    /// Whether this writer supports colors/formatting
    fn supports_colors(&self) -> bool {
        false
    }
}

/// Create a default output writer based on environment
pub fn default_output(verbose: bool) -> Box<dyn OutputWriter> {
    if atty::is(atty::Stream::Stdout) {
        Box::new(TerminalOutput::new().with_verbose(verbose))
    } else {
        Box::new(PlainOutput::new().with_verbose(verbose))
    }
}

/// Keys the operator can press at a checkpoint
pub(crate) fn checkpoint_help(can_skip: bool) -> &'static str {
    if can_skip {
        "[r]esume  [n]ext step  [s]kip agent  [k]ill"
    } else {
        "[r]esume  [n]ext step  [k]ill"
    }
}

/// First lines of a block of code plus a count of the rest
pub(crate) fn preview(text: &str, max_lines: usize) -> String {
    let total = text.lines().count();
    let shown: Vec<&str> = text.lines().take(max_lines).collect();
    if total > max_lines {
        format!("{}\n... ({} more lines)", shown.join("\n"), total - max_lines)
    } else {
        shown.join("\n")
    }
}
