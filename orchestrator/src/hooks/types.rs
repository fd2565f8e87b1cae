//! Hook phases, events, results and control signals

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{AgentResponse, Handoff, Role};

/// Checkpoints in a workflow run, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    WorkflowStart,
    PreAgent,
    MidAgent,
    PostAgent,
    PreHandoff,
    PostHandoff,
    WorkflowEnd,
}

impl HookPhase {
    pub const ALL: [HookPhase; 7] = [
        HookPhase::WorkflowStart,
        HookPhase::PreAgent,
        HookPhase::MidAgent,
        HookPhase::PostAgent,
        HookPhase::PreHandoff,
        HookPhase::PostHandoff,
        HookPhase::WorkflowEnd,
    ];
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::WorkflowStart => "workflow_start",
            HookPhase::PreAgent => "pre_agent",
            HookPhase::MidAgent => "mid_agent",
            HookPhase::PostAgent => "post_agent",
            HookPhase::PreHandoff => "pre_handoff",
            HookPhase::PostHandoff => "post_handoff",
            HookPhase::WorkflowEnd => "workflow_end",
        };
        f.write_str(name)
    }
}

/// What a hook sees at a checkpoint
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub phase: HookPhase,
    pub task_id: String,
    pub role: Role,
    pub handoff: Option<Handoff>,
    pub response: Option<AgentResponse>,
}

impl HookEvent {
    pub fn new(phase: HookPhase, task_id: impl Into<String>, role: Role) -> Self {
        Self {
            phase,
            task_id: task_id.into(),
            role,
            handoff: None,
            response: None,
        }
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn with_response(mut self, response: AgentResponse) -> Self {
        self.response = Some(response);
        self
    }
}

/// How the workflow should proceed after a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HookAction {
    #[default]
    Continue,
    /// Skip the current step
    Skip { reason: String },
    /// Stop the workflow
    Kill { reason: String },
}

/// Outcome of a checkpoint
///
/// The action and the two replacements are independent: a hook may let the
/// workflow continue while rewriting the handoff it is about to send.
#[derive(Debug, Clone, Default)]
pub struct HookResult {
    pub action: HookAction,
    /// Replaces the live handoff when set
    pub handoff: Option<Handoff>,
    /// Replaces the live agent response when set
    pub response: Option<AgentResponse>,
}

impl HookResult {
    pub fn proceed() -> Self {
        Self::default()
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: HookAction::Skip {
                reason: reason.into(),
            },
            ..Default::default()
        }
    }

    pub fn kill(reason: impl Into<String>) -> Self {
        Self {
            action: HookAction::Kill {
                reason: reason.into(),
            },
            ..Default::default()
        }
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn with_response(mut self, response: AgentResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn is_continue(&self) -> bool {
        self.action == HookAction::Continue
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.action, HookAction::Skip { .. })
    }

    pub fn is_kill(&self) -> bool {
        matches!(self.action, HookAction::Kill { .. })
    }
}

/// Callback invoked at a checkpoint
pub type HookHandler = Arc<dyn Fn(&HookEvent) -> HookResult + Send + Sync>;

/// Operator instruction delivered to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSignal {
    /// Run exactly one more agent, then pause
    Step,
    /// Skip the pending agent
    Skip,
    /// Stop the workflow for good
    Kill,
    Pause,
    Resume,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlSignal::Step => "step",
            ControlSignal::Skip => "skip",
            ControlSignal::Kill => "kill",
            ControlSignal::Pause => "pause",
            ControlSignal::Resume => "resume",
        };
        f.write_str(name)
    }
}

impl FromStr for ControlSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "step" | "n" | "next" => Ok(ControlSignal::Step),
            "skip" | "s" => Ok(ControlSignal::Skip),
            "kill" | "k" | "quit" => Ok(ControlSignal::Kill),
            "pause" | "p" => Ok(ControlSignal::Pause),
            "resume" | "r" | "continue" => Ok(ControlSignal::Resume),
            other => Err(format!("unknown control signal: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut phases = HookPhase::ALL.to_vec();
        phases.sort();
        assert_eq!(phases, HookPhase::ALL.to_vec());
        assert_eq!(HookPhase::PostAgent.to_string(), "post_agent");
    }

    #[test]
    fn test_result_constructors() {
        assert!(HookResult::proceed().is_continue());
        assert!(HookResult::skip("not needed").is_skip());
        assert!(HookResult::kill("stop").is_kill());
        assert!(!HookResult::kill("stop").is_continue());
    }

    #[test]
    fn test_signal_parsing() {
        assert_eq!("p".parse::<ControlSignal>().unwrap(), ControlSignal::Pause);
        assert_eq!("Resume".parse::<ControlSignal>().unwrap(), ControlSignal::Resume);
        assert_eq!("next".parse::<ControlSignal>().unwrap(), ControlSignal::Step);
        assert!("explode".parse::<ControlSignal>().is_err());
    }
}
