//! CLI argument definitions
//!
//! Contains the main CLI struct and Commands enum for clap parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use orchestrator::Role;

/// Default number of tasks shown by `history`
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Parser)]
#[command(name = "coop")]
#[command(about = "Coordinate architect, implementer, reviewer and navigator agents on a task")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a task through the agent workflow
    Run {
        /// What to build or answer
        task: String,

        /// Only show which role the task would start with
        #[arg(long)]
        dry_run: bool,

        /// Maximum transitions into the reviewer before failing
        #[arg(long, value_name = "N")]
        max_cycles: Option<u32>,

        /// Start with this role instead of routing the task
        #[arg(long, value_name = "ROLE", value_parser = parse_role)]
        workflow: Option<Role>,

        /// Directory for generated artifacts
        #[arg(long, short, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Use scripted agents instead of the configured model command
        #[arg(long)]
        demo: bool,

        /// Pause after every agent
        #[arg(long)]
        step: bool,

        /// Approve every human checkpoint without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show a task and its handoffs (latest task if no id is given)
    Status {
        /// Task id or unique prefix
        task_id: Option<String>,
    },

    /// List recent tasks
    History {
        /// Number of tasks to show
        #[arg(long, short = 'n', default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    let role: Role = raw.parse().map_err(|e| format!("{}", e))?;
    if role == Role::Human {
        return Err("a workflow cannot start with the human role".to_string());
    }
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "coop",
            "-vv",
            "run",
            "Design a cache",
            "--max-cycles",
            "2",
            "--workflow",
            "architect",
            "--demo",
            "--yes",
            "--step",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                task,
                max_cycles,
                workflow,
                demo,
                yes,
                step,
                dry_run,
                output,
            } => {
                assert_eq!(task, "Design a cache");
                assert_eq!(max_cycles, Some(2));
                assert_eq!(workflow, Some(Role::Architect));
                assert!(demo && yes && step);
                assert!(!dry_run);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_roles() {
        assert!(Cli::try_parse_from(["coop", "run", "x", "--workflow", "tester"]).is_err());
        assert!(Cli::try_parse_from(["coop", "run", "x", "--workflow", "human"]).is_err());
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["coop", "history"]).unwrap();
        match cli.command {
            Commands::History { limit } => assert_eq!(limit, DEFAULT_HISTORY_LIMIT),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
