//! History command handler

use anyhow::Result;
use chrono::Local;

use super::{one_line, short_id, CommandContext};

/// Handle the `history` command
pub fn run_history(ctx: &CommandContext, limit: usize) -> Result<()> {
    let db = ctx.database()?;
    let tasks = db.recent_tasks(Some(limit))?;

    if tasks.is_empty() {
        println!("No tasks recorded yet.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<11}  {:<16}  {:>8}  {}",
        "ID", "STATUS", "CREATED", "HANDOFFS", "TASK"
    );
    for task in tasks {
        let handoffs = db.handoff_count(&task.id)?;
        println!(
            "{:<8}  {:<11}  {:<16}  {:>8}  {}",
            short_id(&task.id),
            task.status.to_string(),
            task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            handoffs,
            one_line(&task.description, 60)
        );
    }

    Ok(())
}
