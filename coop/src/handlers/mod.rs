//! Command handlers module
//!
//! One handler per subcommand. [`CommandContext`] carries the resolved
//! settings shared across handlers.

use anyhow::Result;

use crate::config::Settings;
use crate::db::Database;

pub mod history;
pub mod run;
pub mod status;

pub use history::run_history;
pub use run::{run_task, RunOptions};
pub use status::run_status;

/// Shared context for command handlers
pub struct CommandContext {
    pub verbose: u8,
    pub settings: Settings,
}

impl CommandContext {
    pub fn new(verbose: u8, settings: Settings) -> Self {
        Self { verbose, settings }
    }

    /// Check if verbose mode is enabled (any -v flag)
    pub fn is_verbose(&self) -> bool {
        self.verbose >= 1
    }

    /// Open the task database under the data directory
    pub fn database(&self) -> Result<Database> {
        Database::open_at(self.settings.database_path())
    }
}

/// Shorten an id for display
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Cut text to `max` characters on one line
pub(crate) fn one_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else if text.lines().nth(1).is_some() {
        format!("{} ...", line)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("short", 10), "short");
        assert_eq!(one_line("a much longer line", 10), "a much ...");
        assert_eq!(one_line("first\nsecond", 20), "first ...");
    }
}
