//! Agent contract and registry
//!
//! An agent is anything that can take a handoff and produce a response:
//! an external model CLI, a scripted stand-in, or a human at a prompt.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::types::{AgentResponse, Handoff, Role};

/// A participant that executes one workflow step
#[async_trait]
pub trait Agent: Send + Sync {
    /// The role this agent plays
    fn role(&self) -> Role;

    /// Execute a handoff. Implementations should return promptly with
    /// [`AgentError::Cancelled`] once `cancel` fires.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        handoff: Handoff,
    ) -> Result<AgentResponse, AgentError>;
}

/// Maps roles to the agents that play them
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<Role, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under the role it reports. Replaces any previous
    /// agent for that role.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let role = agent.role();
        if self.agents.insert(role, agent).is_some() {
            tracing::debug!(%role, "Replaced agent");
        }
    }

    /// Builder-style [`register`](AgentRegistry::register)
    pub fn with(mut self, agent: Arc<dyn Agent>) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, role: Role) -> Option<Arc<dyn Agent>> {
        self.agents.get(&role).cloned()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.agents.contains_key(&role)
    }

    /// Registered roles, in routing priority order
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.agents.contains_key(role))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NextRole;

    struct Echo(Role);

    #[async_trait]
    impl Agent for Echo {
        fn role(&self) -> Role {
            self.0
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            handoff: Handoff,
        ) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse::new(handoff.context.task_description, NextRole::Done))
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = AgentRegistry::new()
            .with(Arc::new(Echo(Role::Reviewer)))
            .with(Arc::new(Echo(Role::Architect)));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(Role::Architect));
        assert!(!registry.contains(Role::Navigator));
        assert_eq!(registry.get(Role::Reviewer).unwrap().role(), Role::Reviewer);
        assert_eq!(registry.roles(), vec![Role::Architect, Role::Reviewer]);
    }

    #[test]
    fn test_registry_replaces_same_role() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Echo(Role::Implementer)));
        registry.register(Arc::new(Echo(Role::Implementer)));
        assert_eq!(registry.len(), 1);
    }
}
