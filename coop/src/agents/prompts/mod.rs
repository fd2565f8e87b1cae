//! System prompts for the workflow roles
//!
//! Every prompt ends with the same output protocol so that
//! [`super::protocol::parse_output`] can read the agent's intent.

mod architect;
mod implementer;
mod navigator;
mod reviewer;

pub use architect::ARCHITECT_PROMPT;
pub use implementer::IMPLEMENTER_PROMPT;
pub use navigator::NAVIGATOR_PROMPT;
pub use reviewer::REVIEWER_PROMPT;

use orchestrator::Role;

/// Built-in system prompt for a role (none for the human operator)
pub fn system_prompt(role: Role) -> Option<&'static str> {
    match role {
        Role::Architect => Some(ARCHITECT_PROMPT),
        Role::Implementer => Some(IMPLEMENTER_PROMPT),
        Role::Reviewer => Some(REVIEWER_PROMPT),
        Role::Navigator => Some(NAVIGATOR_PROMPT),
        Role::Human => None,
    }
}
