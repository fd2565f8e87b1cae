//! Concrete agents for the workflow roles
//!
//! - [`CommandAgent`] runs an external model CLI per call
//! - [`DemoAgent`] returns scripted output for `--demo`
//!
//! The human role is always served by [`orchestrator::HumanAgent`].

pub mod command;
pub mod demo;
pub mod prompts;
pub mod protocol;

pub use command::CommandAgent;
pub use demo::DemoAgent;

use std::sync::Arc;
use std::time::Duration;

use orchestrator::{AgentRegistry, Role};

use crate::config::Settings;

/// Roles played by a model rather than the operator
pub const AI_ROLES: [Role; 4] = [
    Role::Architect,
    Role::Implementer,
    Role::Reviewer,
    Role::Navigator,
];

/// Registry of command agents for every AI role
pub fn command_registry(settings: &Settings) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for role in AI_ROLES {
        match settings.agent(role) {
            Some(command) => registry.register(Arc::new(CommandAgent::new(role, command.clone()))),
            None => tracing::warn!(%role, "No agent command configured"),
        }
    }
    registry
}

/// Registry of scripted agents for every AI role
pub fn demo_registry(delay: Duration) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for role in AI_ROLES {
        registry.register(Arc::new(DemoAgent::new(role).with_delay(delay)));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoopFileConfig;

    #[test]
    fn test_registries_cover_ai_roles() {
        let demo = demo_registry(Duration::ZERO);
        assert_eq!(demo.len(), AI_ROLES.len());
        assert!(!demo.contains(Role::Human));

        let file: CoopFileConfig = toml::from_str(r#"storage = { dir = "/tmp/coop" }"#).unwrap();
        let settings = Settings::resolve(file, |_| None).unwrap();
        let commands = command_registry(&settings);
        for role in AI_ROLES {
            assert!(commands.contains(role));
        }
    }
}
