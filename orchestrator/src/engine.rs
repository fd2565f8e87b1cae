//! Workflow execution engine
//!
//! Drives the role-transition loop for one task:
//! - routes the task to a starting role
//! - hands the running context and artifacts to one agent at a time
//! - merges what each agent produced and follows its next-role hint
//! - enforces the review-cycle limit
//! - consults the hook controller at every checkpoint
//!
//! A run ends when an agent answers `Done`, an agent fails, the review limit
//! is hit, the caller cancels, or the operator kills it. All of these produce
//! a [`WorkflowResult`]. Only configuration and setup failures are returned
//! as errors.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentRegistry};
use crate::error::{AgentError, WorkflowError};
use crate::events::WorkflowEvents;
use crate::hooks::{ControlSignal, HookAction, HookController, HookEvent, HookPhase, HookResult};
use crate::router::Router;
use crate::store::Store;
use crate::types::{
    AgentResponse, Artifacts, Context, Handoff, NextRole, Role, Task, TaskStatus, CODE,
};

/// Review cycles allowed when nothing else is configured
pub const DEFAULT_MAX_REVIEW_CYCLES: u32 = 3;

/// Configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// How many times control may pass to the reviewer
    pub max_review_cycles: u32,

    /// Start every run in step mode (pause after the first agent)
    pub step_through: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_review_cycles: DEFAULT_MAX_REVIEW_CYCLES,
            step_through: false,
        }
    }
}

impl WorkflowConfig {
    pub fn with_max_review_cycles(mut self, max: u32) -> Self {
        self.max_review_cycles = max;
        self
    }

    pub fn with_step_through(mut self, step_through: bool) -> Self {
        self.step_through = step_through;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// An agent answered `Done`
    Completed,
    /// Control passed to the reviewer more often than allowed
    ReviewLimitExceeded { cycles: u32, max: u32 },
    /// An agent returned an error
    AgentFailed { role: Role, message: String },
    /// The caller cancelled the run
    Cancelled,
    /// The operator or a hook killed the run
    Killed { reason: String },
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed)
    }
}

impl fmt::Display for WorkflowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowOutcome::Completed => write!(f, "completed"),
            WorkflowOutcome::ReviewLimitExceeded { max, .. } => {
                write!(f, "exceeded max review cycles ({})", max)
            }
            WorkflowOutcome::AgentFailed { role, message } => {
                write!(f, "{} agent failed: {}", role, message)
            }
            WorkflowOutcome::Cancelled => write!(f, "workflow cancelled"),
            WorkflowOutcome::Killed { reason } => write!(f, "workflow killed: {}", reason),
        }
    }
}

/// Result of a workflow run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub task: Task,
    pub success: bool,
    pub outcome: WorkflowOutcome,
    /// Handoffs recorded during the run, in order
    pub handoffs: Vec<Handoff>,
    /// Everything the agents produced
    pub artifacts: Artifacts,
    pub total_tokens: u64,
    pub duration: Duration,
}

impl WorkflowResult {
    /// The failure as an error, or `None` if the run completed
    pub fn error(&self) -> Option<WorkflowError> {
        match &self.outcome {
            WorkflowOutcome::Completed => None,
            WorkflowOutcome::ReviewLimitExceeded { max, .. } => {
                Some(WorkflowError::ReviewLimitExceeded { max: *max })
            }
            WorkflowOutcome::AgentFailed { role, message } => Some(WorkflowError::Agent {
                role: *role,
                source: AgentError::Reported(message.clone()),
            }),
            WorkflowOutcome::Cancelled => Some(WorkflowError::Cancelled),
            WorkflowOutcome::Killed { reason } => Some(WorkflowError::Killed(reason.clone())),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Loop-local state of one run
struct WorkflowState {
    task: Task,
    handoffs: Vec<Handoff>,
    current: Role,
    from: Role,
    context: Context,
    artifacts: Artifacts,
    review_cycles: u32,
    total_tokens: u64,
    steps: u32,
}

impl WorkflowState {
    fn new(task: Task, start: Role) -> Self {
        let context = Context::new(task.description.clone());
        Self {
            task,
            handoffs: Vec::new(),
            current: start,
            // The operator submitted the task
            from: Role::Human,
            context,
            artifacts: Artifacts::default(),
            review_cycles: 0,
            total_tokens: 0,
            steps: 0,
        }
    }

    fn event(&self, phase: HookPhase, role: Role) -> HookEvent {
        HookEvent::new(phase, self.task.id.clone(), role)
    }
}

/// Why an agent call did not produce a response
enum Interrupted {
    Cancelled,
    Killed,
    Failed(AgentError),
}

fn kill_reason(result: &HookResult) -> Option<String> {
    match &result.action {
        HookAction::Kill { reason } => Some(reason.clone()),
        _ => None,
    }
}

/// Return a `Killed` outcome from the loop when a checkpoint says so
macro_rules! stop_if_killed {
    ($result:expr) => {
        if let Some(reason) = kill_reason(&$result) {
            return Ok(WorkflowOutcome::Killed { reason });
        }
    };
}

/// Workflow execution engine
pub struct WorkflowEngine {
    agents: AgentRegistry,
    store: Arc<dyn Store>,
    hooks: Arc<HookController>,
    router: Router,
    config: WorkflowConfig,
    events: WorkflowEvents,
}

impl WorkflowEngine {
    /// Create an engine with its own hook controller and no observers
    pub fn new(agents: AgentRegistry, store: Arc<dyn Store>, config: WorkflowConfig) -> Self {
        Self {
            agents,
            store,
            hooks: Arc::new(HookController::new()),
            router: Router::new(),
            config,
            events: WorkflowEvents::none(),
        }
    }

    /// Share a hook controller with the caller (e.g. an operator console)
    pub fn with_hooks(mut self, hooks: Arc<HookController>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Attach observer channels
    pub fn with_events(mut self, events: WorkflowEvents) -> Self {
        self.events = events;
        self
    }

    pub fn hooks(&self) -> &Arc<HookController> {
        &self.hooks
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Route the task and run it to completion
    pub async fn run(
        &self,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let role = self.router.route(description);
        self.run_with_role(description, role, cancel).await
    }

    /// Run the task starting from a fixed role
    pub async fn run_with_role(
        &self,
        description: &str,
        start: Role,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let started = Instant::now();

        self.hooks.reset();
        self.hooks.set_events(self.events.clone());
        if self.config.step_through {
            self.hooks.send_signal(ControlSignal::Step);
        }
        let kill = self.hooks.kill_token();

        let mut task = self.store.create_task(description)?;
        self.store
            .update_task_status(&task.id, TaskStatus::InProgress)?;
        task.status = TaskStatus::InProgress;

        tracing::info!(task_id = %task.id, role = %start, "Starting workflow");
        self.events
            .progress("start", 0, format!("Starting with {}", start));

        let mut state = WorkflowState::new(task, start);

        let start_result = self
            .hooks
            .emit(
                HookPhase::WorkflowStart,
                state.event(HookPhase::WorkflowStart, start),
                cancel,
            )
            .await;

        let outcome = match kill_reason(&start_result) {
            Some(reason) => Ok(WorkflowOutcome::Killed { reason }),
            None => self.drive(&mut state, &kill, cancel).await,
        };
        // A pause wait ends with a kill result when the caller cancels
        let outcome = match outcome {
            Ok(WorkflowOutcome::Killed { .. }) if cancel.is_cancelled() && !self.hooks.is_killed() => {
                Ok(WorkflowOutcome::Cancelled)
            }
            other => other,
        };

        match outcome {
            Ok(outcome) => Ok(self.finish(state, outcome, started)),
            Err(e) => {
                tracing::error!(task_id = %state.task.id, "Workflow aborted: {}", e);
                self.record_status(&state.task.id, TaskStatus::Failed);
                self.events.error(e.to_string());
                self.hooks
                    .dispatch(state.event(HookPhase::WorkflowEnd, state.current));
                self.events.done(&state.task.id, false);
                Err(e)
            }
        }
    }

    /// The role-transition loop
    async fn drive(
        &self,
        state: &mut WorkflowState,
        kill: &CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(WorkflowOutcome::Cancelled);
            }

            let role = state.current;
            let agent = self
                .agents
                .get(role)
                .ok_or(WorkflowError::NoAgentForRole(role))?;

            let mut handoff = Handoff::new(
                state.task.id.clone(),
                state.from,
                role,
                state.context.clone(),
                state.artifacts.clone(),
            );

            // ---- PreAgent: may skip the agent or rewrite its input ----
            let pre = self
                .hooks
                .emit(
                    HookPhase::PreAgent,
                    state
                        .event(HookPhase::PreAgent, role)
                        .with_handoff(handoff.clone()),
                    cancel,
                )
                .await;
            stop_if_killed!(pre);
            if let Some(replacement) = pre.handoff.clone() {
                handoff = replacement;
            }

            state.steps += 1;
            let percent = (10 + state.steps * 15).min(90) as u8;
            self.events
                .progress("agent", percent, format!("{} working", role));

            let mut response = if let HookAction::Skip { reason } = &pre.action {
                tracing::info!(%role, %reason, "Agent skipped");
                pre.response
                    .clone()
                    .unwrap_or_else(|| AgentResponse::skipped(&handoff))
            } else {
                match self
                    .call_agent(agent.as_ref(), handoff.clone(), kill, cancel)
                    .await
                {
                    Ok(response) => response,
                    Err(Interrupted::Cancelled) => return Ok(WorkflowOutcome::Cancelled),
                    Err(Interrupted::Killed) => {
                        let reason = self
                            .hooks
                            .kill_reason()
                            .unwrap_or_else(|| "killed by operator".to_string());
                        return Ok(WorkflowOutcome::Killed { reason });
                    }
                    Err(Interrupted::Failed(e)) => {
                        tracing::error!(%role, "Agent failed: {}", e);
                        return Ok(WorkflowOutcome::AgentFailed {
                            role,
                            message: e.to_string(),
                        });
                    }
                }
            };

            // ---- MidAgent: raw response, before it touches the state ----
            let mid = self
                .hooks
                .emit(
                    HookPhase::MidAgent,
                    state
                        .event(HookPhase::MidAgent, role)
                        .with_handoff(handoff.clone())
                        .with_response(response.clone()),
                    cancel,
                )
                .await;
            stop_if_killed!(mid);
            if let Some(replacement) = mid.response {
                response = replacement;
            }
            if let Some(replacement) = mid.handoff {
                handoff = replacement;
            }

            self.merge_artifacts(state, role, &response);
            state.total_tokens += response.tokens_used;
            self.events
                .tokens(role, response.tokens_used, state.total_tokens);

            // ---- PostAgent: step mode pauses here ----
            let post = self
                .hooks
                .emit(
                    HookPhase::PostAgent,
                    state
                        .event(HookPhase::PostAgent, role)
                        .with_handoff(handoff.clone())
                        .with_response(response.clone()),
                    cancel,
                )
                .await;
            stop_if_killed!(post);
            if let Some(replacement) = post.response {
                self.merge_artifacts(state, role, &replacement);
                response = replacement;
            }

            // The persisted record is the handoff this agent received,
            // completed with what it produced
            let mut record = post.handoff.unwrap_or(handoff);
            record.artifacts = state.artifacts.clone();
            record.metadata = response.metadata();

            if response.next.is_done() {
                return Ok(self.complete(state, role, record));
            }

            // ---- PreHandoff: may rewrite or drop the record, or redirect ----
            let pre_handoff = self
                .hooks
                .emit(
                    HookPhase::PreHandoff,
                    state
                        .event(HookPhase::PreHandoff, role)
                        .with_handoff(record.clone())
                        .with_response(response.clone()),
                    cancel,
                )
                .await;
            stop_if_killed!(pre_handoff);
            if let Some(replacement) = pre_handoff.response.clone() {
                self.merge_artifacts(state, role, &replacement);
                response = replacement;
                record.artifacts = state.artifacts.clone();
                record.metadata = response.metadata();
            }
            let record = pre_handoff.handoff.clone().unwrap_or(record);
            let keep_record = !pre_handoff.is_skip();

            let next_role = match response.next {
                NextRole::Done if keep_record => return Ok(self.complete(state, role, record)),
                NextRole::Done => {
                    tracing::debug!(%role, "Final handoff record skipped by hook");
                    self.events
                        .handoff(&state.task.id, role, NextRole::Done, "work complete");
                    return Ok(WorkflowOutcome::Completed);
                }
                NextRole::Continue(next_role) => next_role,
            };

            if next_role == Role::Reviewer {
                state.review_cycles += 1;
                if state.review_cycles > self.config.max_review_cycles {
                    tracing::warn!(
                        cycles = state.review_cycles,
                        max = self.config.max_review_cycles,
                        "Review limit exceeded"
                    );
                    return Ok(WorkflowOutcome::ReviewLimitExceeded {
                        cycles: state.review_cycles,
                        max: self.config.max_review_cycles,
                    });
                }
            }

            if keep_record {
                self.persist(&record);
                state.handoffs.push(record);
            } else {
                tracing::debug!(%role, "Handoff record skipped by hook");
            }

            self.events.handoff(
                &state.task.id,
                role,
                response.next,
                format!("{} handed off to {}", role, next_role),
            );
            tracing::info!(from = %role, to = %next_role, "Handoff");

            // The next agent works from this agent's output
            state.context.task_description = response.content;
            state.from = role;
            state.current = next_role;

            // ---- PostHandoff ----
            let post_handoff = self
                .hooks
                .emit(
                    HookPhase::PostHandoff,
                    state.event(HookPhase::PostHandoff, next_role),
                    cancel,
                )
                .await;
            stop_if_killed!(post_handoff);
        }
    }

    /// Fold a response's artifacts into the run, reporting new code
    fn merge_artifacts(&self, state: &mut WorkflowState, role: Role, response: &AgentResponse) {
        let changed = state.artifacts.merge(&response.artifacts);
        if !changed.is_empty() {
            tracing::debug!(%role, ?changed, "Merged artifacts");
        }
        if changed.iter().any(|key| key == CODE) {
            if let Some(code) = &state.artifacts.code {
                self.events.code(role, code);
            }
        }
    }

    /// Record the final handoff of a finished run
    fn complete(&self, state: &mut WorkflowState, role: Role, record: Handoff) -> WorkflowOutcome {
        self.persist(&record);
        state.handoffs.push(record);
        self.events
            .handoff(&state.task.id, role, NextRole::Done, "work complete");
        WorkflowOutcome::Completed
    }

    /// Run one agent, abandoning it on cancellation or kill
    async fn call_agent(
        &self,
        agent: &dyn Agent,
        handoff: Handoff,
        kill: &CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, Interrupted> {
        let role = agent.role();
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
            _ = kill.cancelled() => return Err(Interrupted::Killed),
            result = agent.execute(cancel, handoff) => result,
        };

        match result {
            Ok(mut response) => {
                if response.duration.is_zero() {
                    response.duration = started.elapsed();
                }
                tracing::debug!(
                    %role,
                    tokens = response.tokens_used,
                    next = %response.next,
                    "Agent finished in {}ms",
                    response.duration.as_millis()
                );
                Ok(response)
            }
            Err(AgentError::Cancelled) if cancel.is_cancelled() => Err(Interrupted::Cancelled),
            Err(e) => Err(Interrupted::Failed(e)),
        }
    }

    /// Save a handoff; failures are logged and the run goes on
    fn persist(&self, handoff: &Handoff) {
        if let Err(e) = self.store.save_handoff(&handoff.task_id, handoff) {
            tracing::warn!(task_id = %handoff.task_id, "Failed to save handoff: {}", e);
        }
    }

    fn record_status(&self, task_id: &str, status: TaskStatus) {
        if let Err(e) = self.store.update_task_status(task_id, status) {
            tracing::warn!(%task_id, %status, "Failed to update task status: {}", e);
        }
    }

    fn finish(
        &self,
        mut state: WorkflowState,
        outcome: WorkflowOutcome,
        started: Instant,
    ) -> WorkflowResult {
        let success = outcome.is_success();
        let status = if success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.record_status(&state.task.id, status);
        state.task.status = status;

        let task_id = state.task.id.clone();
        match &outcome {
            WorkflowOutcome::Completed => {
                tracing::info!(%task_id, tokens = state.total_tokens, "Workflow completed")
            }
            WorkflowOutcome::Cancelled => tracing::info!(%task_id, "Workflow cancelled"),
            WorkflowOutcome::Killed { reason } => {
                tracing::info!(%task_id, %reason, "Workflow killed")
            }
            other => tracing::warn!(%task_id, "Workflow failed: {}", other),
        }

        if !success {
            self.events.error(outcome.to_string());
        }
        self.events.progress("done", 100, outcome.to_string());

        let mut end = state.event(HookPhase::WorkflowEnd, state.current);
        if let Some(last) = state.handoffs.last() {
            end = end.with_handoff(last.clone());
        }
        self.hooks.dispatch(end);
        self.events.done(&task_id, success);

        WorkflowResult {
            task: state.task,
            success,
            outcome,
            handoffs: state.handoffs,
            artifacts: state.artifacts,
            total_tokens: state.total_tokens,
            duration: started.elapsed(),
        }
    }
}
