//! Human-in-the-loop agent
//!
//! Plays the Human role by turning the incoming handoff into a decision
//! request for the operator and mapping the answer back into a response.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::error::AgentError;
use crate::events::{Decision, DecisionSender};
use crate::types::{AgentResponse, Handoff, NextRole, Role, NOTES};

enum Mode {
    /// Ask the operator over the decision channel
    Ask(DecisionSender),
    /// Approve everything without asking (non-interactive runs)
    AutoApprove,
}

/// Agent for the Human role
pub struct HumanAgent {
    mode: Mode,
}

impl HumanAgent {
    /// Ask the operator for every decision
    pub fn new(decisions: DecisionSender) -> Self {
        Self {
            mode: Mode::Ask(decisions),
        }
    }

    /// Approve every decision without asking
    pub fn auto_approve() -> Self {
        Self {
            mode: Mode::AutoApprove,
        }
    }
}

/// The most relevant thing for the operator to look at
fn review_content(handoff: &Handoff) -> Option<String> {
    let artifacts = &handoff.artifacts;
    let preferred = match handoff.from_role {
        Role::Architect => artifacts.design_doc.as_ref(),
        Role::Implementer => artifacts.code.as_ref(),
        Role::Reviewer => artifacts.review_feedback.as_ref(),
        Role::Navigator | Role::Human => None,
    };

    preferred
        .cloned()
        .or_else(|| Some(handoff.context.task_description.clone()))
        .filter(|text| !text.trim().is_empty())
}

/// Map an operator decision onto the workflow protocol
fn into_response(decision: Decision, handoff: &Handoff) -> Result<AgentResponse, AgentError> {
    let from = handoff.from_role;
    let carried = handoff.context.task_description.clone();

    match decision {
        Decision::Approved => Ok(AgentResponse::new(carried, from.default_successor())),
        Decision::ApprovedWithNote(note) => {
            Ok(AgentResponse::new(carried, from.default_successor()).with_artifact(NOTES, note))
        }
        Decision::Edit(changes) => {
            // Send the work back to whoever produced it
            let next = match from {
                Role::Human => NextRole::Done,
                role => NextRole::Continue(role),
            };
            Ok(AgentResponse::new(changes, next))
        }
        Decision::Rejected => Err(AgentError::Rejected),
    }
}

#[async_trait]
impl Agent for HumanAgent {
    fn role(&self) -> Role {
        Role::Human
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        handoff: Handoff,
    ) -> Result<AgentResponse, AgentError> {
        let decision = match &self.mode {
            Mode::AutoApprove => {
                tracing::info!(from = %handoff.from_role, "Auto-approved (non-interactive mode)");
                Decision::Approved
            }
            Mode::Ask(decisions) => {
                let message = format!("Approve the {}'s work?", handoff.from_role);
                decisions
                    .request(
                        cancel,
                        &handoff.task_id,
                        handoff.from_role,
                        message,
                        review_content(&handoff),
                    )
                    .await?
            }
        };

        tracing::debug!(?decision, "Operator decision");
        into_response(decision, &handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::decision_channel;
    use crate::types::{Artifacts, Context};

    fn handoff_from(from: Role) -> Handoff {
        let mut artifacts = Artifacts::default();
        artifacts.design_doc = Some("# Plan".to_string());
        Handoff::new("t1", from, Role::Human, Context::new("design text"), artifacts)
    }

    #[tokio::test]
    async fn test_auto_approve_follows_protocol() {
        let agent = HumanAgent::auto_approve();
        let cancel = CancellationToken::new();

        let response = agent
            .execute(&cancel, handoff_from(Role::Architect))
            .await
            .unwrap();
        assert_eq!(response.next, NextRole::Continue(Role::Implementer));
        assert_eq!(response.content, "design text");
    }

    #[tokio::test]
    async fn test_note_becomes_artifact() {
        let (sender, mut requests) = decision_channel();
        let agent = HumanAgent::new(sender);
        let cancel = CancellationToken::new();

        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.content.as_deref(), Some("# Plan"));
            request.respond(Decision::ApprovedWithNote("use sqlite".to_string()));
        });

        let response = agent
            .execute(&cancel, handoff_from(Role::Architect))
            .await
            .unwrap();
        assert_eq!(response.artifacts[NOTES], "use sqlite");
        assert_eq!(response.next, NextRole::Continue(Role::Implementer));
    }

    #[tokio::test]
    async fn test_edit_sends_work_back() {
        let (sender, mut requests) = decision_channel();
        let agent = HumanAgent::new(sender);
        let cancel = CancellationToken::new();

        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            request.respond(Decision::Edit("split the module".to_string()));
        });

        let response = agent
            .execute(&cancel, handoff_from(Role::Implementer))
            .await
            .unwrap();
        assert_eq!(response.content, "split the module");
        assert_eq!(response.next, NextRole::Continue(Role::Implementer));
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let (sender, mut requests) = decision_channel();
        let agent = HumanAgent::new(sender);
        let cancel = CancellationToken::new();

        tokio::spawn(async move {
            requests.recv().await.unwrap().respond(Decision::Rejected);
        });

        let result = agent.execute(&cancel, handoff_from(Role::Reviewer)).await;
        assert!(matches!(result, Err(AgentError::Rejected)));
    }
}
