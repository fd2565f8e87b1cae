//! Status command handler
//!
//! Show one task and its recorded handoffs.

use anyhow::{anyhow, Result};
use chrono::Local;
use orchestrator::Handoff;

use super::{one_line, CommandContext};

/// Handle the `status` command
pub fn run_status(ctx: &CommandContext, task_id: Option<&str>) -> Result<()> {
    let db = ctx.database()?;

    let task = match task_id {
        Some(id) => db
            .task_by_prefix(id)?
            .ok_or_else(|| anyhow!("No task found with id '{}'", id))?,
        None => db
            .recent_tasks(Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No tasks recorded yet"))?,
    };
    let handoffs = db.handoffs(&task.id)?;

    println!("Task:    {}", task.id);
    println!("Status:  {}", task.status);
    println!(
        "Created: {}",
        task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("\n{}\n", task.description);

    if handoffs.is_empty() {
        println!("No handoffs recorded.");
        return Ok(());
    }

    println!("Handoffs:");
    for (i, handoff) in handoffs.iter().enumerate() {
        println!("  {}", handoff_line(i + 1, handoff));
    }

    let total: u64 = handoffs.iter().map(|h| h.metadata.tokens_used).sum();
    println!("\nTotal tokens: {}", total);

    if let Some(last) = handoffs.last() {
        let artifacts = &last.artifacts;
        println!("\nArtifacts:");
        for (name, value) in [
            ("design_doc", &artifacts.design_doc),
            ("code", &artifacts.code),
            ("review_feedback", &artifacts.review_feedback),
            ("notes", &artifacts.notes),
        ] {
            if let Some(text) = value {
                println!("  {:<16} {} lines", name, text.lines().count());
            }
        }
        for key in artifacts.extra.keys() {
            println!("  {:<16} (extra)", key);
        }
    }

    Ok(())
}

fn handoff_line(index: usize, handoff: &Handoff) -> String {
    let meta = &handoff.metadata;
    let model = if meta.model.is_empty() {
        "-".to_string()
    } else {
        meta.model.clone()
    };
    format!(
        "{:>2}. {:<11} -> {:<11} {:>6} tokens {:>7}ms  {:<10} {}",
        index,
        handoff.from_role.as_str(),
        handoff.to_role.as_str(),
        meta.tokens_used,
        meta.duration.as_millis(),
        model,
        one_line(&handoff.context.task_description, 40)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::{Artifacts, Context, Role};

    #[test]
    fn test_handoff_line() {
        let mut handoff = Handoff::new(
            "t",
            Role::Architect,
            Role::Implementer,
            Context::new("Build it"),
            Artifacts::default(),
        );
        handoff.metadata.tokens_used = 120;
        handoff.metadata.model = "demo".to_string();

        let line = handoff_line(2, &handoff);
        assert!(line.starts_with(" 2. architect"));
        assert!(line.contains("-> implementer"));
        assert!(line.contains("120 tokens"));
        assert!(line.contains("demo"));
        assert!(line.ends_with("Build it"));
    }
}
