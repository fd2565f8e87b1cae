//! Error types for the orchestration engine

use crate::types::Role;

/// Errors raised by an agent while executing a handoff
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent execution failed: {0}")]
    Execution(String),

    #[error("agent timed out after {0}s")]
    Timeout(u64),

    #[error("agent call was cancelled")]
    Cancelled,

    #[error("rejected by operator")]
    Rejected,

    #[error("invalid agent output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure that was already reported and is carried as text
    #[error("{0}")]
    Reported(String),
}

/// Errors raised by a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that end a workflow run
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No agent is registered for a role the workflow routed to.
    /// This is a configuration error and is never retried.
    #[error("no agent registered for role: {0}")]
    NoAgentForRole(Role),

    #[error("{role} agent failed: {source}")]
    Agent {
        role: Role,
        #[source]
        source: AgentError,
    },

    #[error("exceeded max review cycles ({max})")]
    ReviewLimitExceeded { max: u32 },

    #[error("workflow cancelled")]
    Cancelled,

    #[error("workflow killed: {0}")]
    Killed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Whether the operator stopped the run, as opposed to something breaking
    pub fn is_operator_stop(&self) -> bool {
        matches!(self, WorkflowError::Cancelled | WorkflowError::Killed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkflowError::NoAgentForRole(Role::Navigator);
        assert_eq!(err.to_string(), "no agent registered for role: navigator");

        let err = WorkflowError::Killed("operator request".to_string());
        assert_eq!(err.to_string(), "workflow killed: operator request");

        let err = WorkflowError::ReviewLimitExceeded { max: 2 };
        assert_eq!(err.to_string(), "exceeded max review cycles (2)");
    }

    #[test]
    fn test_agent_error_wrapping() {
        let err = WorkflowError::Agent {
            role: Role::Implementer,
            source: AgentError::Execution("model unavailable".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "implementer agent failed: agent execution failed: model unavailable"
        );
        assert!(!err.is_operator_stop());
        assert!(WorkflowError::Cancelled.is_operator_stop());
    }
}
