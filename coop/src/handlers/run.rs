//! Run command handler
//!
//! Wires the engine to the configured agents, the SQLite store, the
//! operator console and the terminal renderer, then reports the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use orchestrator::{
    decision_channel, observer_channels, HookController, HumanAgent, Role, Router, WorkflowEngine,
    WorkflowEvents, WorkflowResult, DEFAULT_EVENT_CAPACITY,
};
use tokio_util::sync::CancellationToken;

use super::{short_id, CommandContext};
use crate::agents::{command_registry, demo_registry};
use crate::console::{stdin_lines, Console};
use crate::output::{default_output, render_events, OutputEvent, OutputWriter};

/// Pause between scripted demo steps so the operator can follow along
const DEMO_STEP_DELAY: Duration = Duration::from_millis(200);

/// Flags of the `run` command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub task: String,
    pub dry_run: bool,
    pub max_cycles: Option<u32>,
    pub workflow: Option<Role>,
    pub output: Option<PathBuf>,
    pub demo: bool,
    pub step: bool,
    pub yes: bool,
}

/// Handle the `run` command
pub async fn run_task(ctx: &CommandContext, opts: RunOptions) -> Result<()> {
    if opts.task.trim().is_empty() {
        bail!("Task description must not be empty");
    }

    let output: Arc<dyn OutputWriter> = Arc::from(default_output(ctx.is_verbose()));

    if opts.dry_run {
        return dry_run(&opts, output.as_ref());
    }

    let mut settings = ctx.settings.clone();
    if let Some(max) = opts.max_cycles {
        settings.max_review_cycles = max;
    }
    if opts.step {
        settings.step_through = true;
    }
    let generated_dir = opts
        .output
        .clone()
        .unwrap_or_else(|| settings.generated_dir.clone());

    let db = ctx.database()?;

    let (decision_tx, decision_rx) = decision_channel();
    let (human, decisions) = if opts.yes {
        (HumanAgent::auto_approve(), None)
    } else {
        (HumanAgent::new(decision_tx), Some(decision_rx))
    };
    let agents = if opts.demo {
        demo_registry(DEMO_STEP_DELAY)
    } else {
        command_registry(&settings)
    }
    .with(Arc::new(human));

    let (events, receivers) = observer_channels(DEFAULT_EVENT_CAPACITY);
    let hooks = Arc::new(HookController::new());
    let engine = WorkflowEngine::new(agents, Arc::new(db), settings.workflow_config())
        .with_hooks(hooks.clone())
        .with_events(events);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling workflow");
                cancel.cancel();
            }
        })
    };

    let renderer = tokio::spawn(render_events(receivers, output.clone()));
    let console_stop = CancellationToken::new();
    let console = Console::new(stdin_lines(), hooks.clone(), output.clone());
    let console_task = tokio::spawn(console.run(decisions, console_stop.clone()));

    output.write(OutputEvent::Heading(format!(
        "Cooperations: {}",
        opts.task.lines().next().unwrap_or_default().trim()
    )));
    if settings.step_through {
        output.write(OutputEvent::Status(
            "Step mode: the run pauses after each agent. Type 'n' to continue.".to_string(),
        ));
    }

    let result = match opts.workflow {
        Some(role) => engine.run_with_role(&opts.task, role, &cancel).await,
        None => engine.run(&opts.task, &cancel).await,
    };

    console_stop.cancel();
    interrupt.abort();
    if let Err(e) = console_task.await {
        tracing::warn!("Console task ended abnormally: {}", e);
    }

    // Release every event sender so the renderer finishes even when the
    // run ended before its final event
    hooks.set_events(WorkflowEvents::none());
    drop(engine);
    let summary = renderer.await.context("Renderer task failed")?;
    tracing::debug!(?summary, "Rendered workflow events");

    let result = result.context("Workflow failed")?;
    report(&result, &generated_dir, output.as_ref())?;

    if !result.success {
        bail!("Task {} {}", short_id(&result.task.id), result.outcome);
    }
    Ok(())
}

fn dry_run(opts: &RunOptions, output: &dyn OutputWriter) -> Result<()> {
    let router = Router::new();
    let (routed, confidence) = router.route_with_confidence(&opts.task);

    output.write(OutputEvent::Heading("Dry run".to_string()));
    match opts.workflow {
        Some(role) => output.write(OutputEvent::Text(format!(
            "Starting role: {} (forced; router picked {} at {:.2})",
            role, routed, confidence
        ))),
        None => output.write(OutputEvent::Text(format!(
            "Starting role: {} (confidence {:.2})",
            routed, confidence
        ))),
    }
    output.flush();
    Ok(())
}

/// Print the outcome and write artifacts to disk
fn report(result: &WorkflowResult, generated_dir: &Path, output: &dyn OutputWriter) -> Result<()> {
    output.write(OutputEvent::NewLine);
    // Failures are reported once, by the caller
    if result.success {
        output.write(OutputEvent::Success(format!(
            "Task {} {}",
            short_id(&result.task.id),
            result.outcome
        )));
    }

    output.write(OutputEvent::Status(format!(
        "{} handoffs, {} tokens, {:.1}s",
        result.handoffs.len(),
        result.total_tokens,
        result.duration.as_secs_f64()
    )));

    let written = write_artifacts(generated_dir, result)?;
    for path in &written {
        output.write(OutputEvent::Status(format!("wrote {}", path.display())));
    }
    output.flush();
    Ok(())
}

/// Write the run's artifacts under `<dir>/<task id>/`
///
/// Returns the files written; nothing is written when the run produced no
/// artifacts.
pub fn write_artifacts(dir: &Path, result: &WorkflowResult) -> Result<Vec<PathBuf>> {
    let artifacts = &result.artifacts;
    if artifacts.is_empty() {
        return Ok(Vec::new());
    }

    let task_dir = dir.join(&result.task.id);
    std::fs::create_dir_all(&task_dir)
        .with_context(|| format!("Failed to create directory: {:?}", task_dir))?;

    let mut written = Vec::new();
    for (file, value) in [
        ("design.md", &artifacts.design_doc),
        ("code.txt", &artifacts.code),
        ("review.md", &artifacts.review_feedback),
        ("notes.md", &artifacts.notes),
    ] {
        if let Some(text) = value {
            let path = task_dir.join(file);
            std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
            written.push(path);
        }
    }

    let path = task_dir.join("artifacts.json");
    let json = serde_json::to_string_pretty(artifacts)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    written.push(path);

    Ok(written)
}
