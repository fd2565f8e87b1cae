use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cooperations::cli::{Cli, Commands};
use cooperations::config::Settings;
use cooperations::handlers::{self, CommandContext, RunOptions};

/// Initialize tracing with verbosity level from CLI flags
///
/// Verbosity levels:
/// - 0 (default): WARN - only warnings and errors
/// - 1 (-v): INFO - general progress
/// - 2 (-vv): DEBUG - detailed debugging
/// - 3+ (-vvv): TRACE - very verbose
///
/// Logs go to stderr so they never mix with command output.
fn init_tracing(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // Allow RUST_LOG to override if set
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    let ctx = CommandContext::new(cli.verbose, settings);

    match cli.command {
        Commands::Run {
            task,
            dry_run,
            max_cycles,
            workflow,
            output,
            demo,
            step,
            yes,
        } => {
            let opts = RunOptions {
                task,
                dry_run,
                max_cycles,
                workflow,
                output,
                demo,
                step,
                yes,
            };
            handlers::run_task(&ctx, opts).await
        }
        Commands::Status { task_id } => handlers::run_status(&ctx, task_id.as_deref()),
        Commands::History { limit } => handlers::run_history(&ctx, limit),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = dispatch(cli).await {
        eprintln!("coop: {:#}", e);
        std::process::exit(1);
    }
}
