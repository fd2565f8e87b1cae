//! Observer channels
//!
//! One-way notifications from the engine and the hook controller to any
//! attached UI. Every channel is bounded and every send is `try_send`: when a
//! consumer is slow or absent, events are dropped instead of stalling the
//! workflow. Treat these as lossy telemetry, not as a guaranteed log.
//!
//! The decision request channel is the exception: it is the one place the
//! workflow side waits on the observer, and only one request can be
//! outstanding at a time.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::hooks::HookPhase;
use crate::types::{NextRole, Role};

/// Default buffer size for each observer channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// Event payloads
// ============================================================================

/// Coarse progress of the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub percent: u8,
    pub message: String,
}

/// Control moved from one role to the next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffEvent {
    pub task_id: String,
    pub from: Role,
    pub to: NextRole,
    pub reason: String,
}

/// Token usage of one agent call plus the running total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenEvent {
    pub role: Role,
    pub tokens: u64,
    pub total: u64,
}

/// The code artifact changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeEvent {
    pub role: Role,
    pub code: String,
}

/// A hook checkpoint was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookNotification {
    pub phase: HookPhase,
    pub role: Role,
    pub paused: bool,
    pub can_skip: bool,
}

/// Final notification for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoneEvent {
    pub task_id: String,
    pub success: bool,
}

// ============================================================================
// Channels
// ============================================================================

/// Receiving ends of the observer channels
pub struct EventReceivers {
    pub progress: mpsc::Receiver<ProgressEvent>,
    pub handoffs: mpsc::Receiver<HandoffEvent>,
    pub tokens: mpsc::Receiver<TokenEvent>,
    pub code: mpsc::Receiver<CodeEvent>,
    pub hooks: mpsc::Receiver<HookNotification>,
    pub errors: mpsc::Receiver<String>,
    pub done: mpsc::Receiver<DoneEvent>,
}

/// Create a connected set of observer channels
pub fn observer_channels(capacity: usize) -> (WorkflowEvents, EventReceivers) {
    let capacity = capacity.max(1);
    let (progress_tx, progress) = mpsc::channel(capacity);
    let (handoff_tx, handoffs) = mpsc::channel(capacity);
    let (tokens_tx, tokens) = mpsc::channel(capacity);
    let (code_tx, code) = mpsc::channel(capacity);
    let (hooks_tx, hooks) = mpsc::channel(capacity);
    let (errors_tx, errors) = mpsc::channel(capacity);
    let (done_tx, done) = mpsc::channel(1);

    let events = WorkflowEvents {
        channels: Some(Senders {
            progress: progress_tx,
            handoffs: handoff_tx,
            tokens: tokens_tx,
            code: code_tx,
            hooks: hooks_tx,
            errors: errors_tx,
            done: done_tx,
        }),
    };

    let receivers = EventReceivers {
        progress,
        handoffs,
        tokens,
        code,
        hooks,
        errors,
        done,
    };

    (events, receivers)
}

#[derive(Clone)]
struct Senders {
    progress: mpsc::Sender<ProgressEvent>,
    handoffs: mpsc::Sender<HandoffEvent>,
    tokens: mpsc::Sender<TokenEvent>,
    code: mpsc::Sender<CodeEvent>,
    hooks: mpsc::Sender<HookNotification>,
    errors: mpsc::Sender<String>,
    done: mpsc::Sender<DoneEvent>,
}

/// Sending side of the observer channels
///
/// Cloneable and cheap. A default instance has no receivers and discards
/// everything.
#[derive(Clone, Default)]
pub struct WorkflowEvents {
    channels: Option<Senders>,
}

/// Send without waiting; a full or closed channel drops the event.
fn offer<T>(sender: &mpsc::Sender<T>, event: T, channel: &'static str) {
    if let Err(mpsc::error::TrySendError::Full(_)) = sender.try_send(event) {
        tracing::trace!(channel, "Observer channel full, dropping event");
    }
}

impl WorkflowEvents {
    /// A sender that discards every event
    pub fn none() -> Self {
        Self { channels: None }
    }

    /// Whether events reach anyone
    pub fn is_active(&self) -> bool {
        self.channels.is_some()
    }

    pub fn progress(&self, stage: &str, percent: u8, message: impl Into<String>) {
        if let Some(ref ch) = self.channels {
            offer(
                &ch.progress,
                ProgressEvent {
                    stage: stage.to_string(),
                    percent: percent.min(100),
                    message: message.into(),
                },
                "progress",
            );
        }
    }

    pub fn handoff(&self, task_id: &str, from: Role, to: NextRole, reason: impl Into<String>) {
        if let Some(ref ch) = self.channels {
            offer(
                &ch.handoffs,
                HandoffEvent {
                    task_id: task_id.to_string(),
                    from,
                    to,
                    reason: reason.into(),
                },
                "handoffs",
            );
        }
    }

    pub fn tokens(&self, role: Role, tokens: u64, total: u64) {
        if let Some(ref ch) = self.channels {
            offer(&ch.tokens, TokenEvent { role, tokens, total }, "tokens");
        }
    }

    pub fn code(&self, role: Role, code: &str) {
        if let Some(ref ch) = self.channels {
            offer(
                &ch.code,
                CodeEvent {
                    role,
                    code: code.to_string(),
                },
                "code",
            );
        }
    }

    pub fn hook(&self, phase: HookPhase, role: Role, paused: bool, can_skip: bool) {
        if let Some(ref ch) = self.channels {
            offer(
                &ch.hooks,
                HookNotification {
                    phase,
                    role,
                    paused,
                    can_skip,
                },
                "hooks",
            );
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        if let Some(ref ch) = self.channels {
            offer(&ch.errors, message.into(), "errors");
        }
    }

    pub fn done(&self, task_id: &str, success: bool) {
        if let Some(ref ch) = self.channels {
            offer(
                &ch.done,
                DoneEvent {
                    task_id: task_id.to_string(),
                    success,
                },
                "done",
            );
        }
    }
}

// ============================================================================
// Decisions (human in the loop)
// ============================================================================

/// Operator answer to a decision request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Approved, continue the workflow
    Approved,
    /// Approved, with a note for the next agent
    ApprovedWithNote(String),
    /// Rejected, stop the workflow
    Rejected,
    /// Send the work back with these changes
    Edit(String),
}

/// A question for the operator
#[derive(Debug)]
pub struct DecisionRequest {
    pub task_id: String,
    /// Role that handed control to the human
    pub requested_by: Role,
    pub message: String,
    /// Content to show before the prompt (e.g. the design doc)
    pub content: Option<String>,
    responder: oneshot::Sender<Decision>,
}

impl DecisionRequest {
    /// Answer the request. Returns false if the requester stopped waiting.
    pub fn respond(self, decision: Decision) -> bool {
        self.responder.send(decision).is_ok()
    }
}

/// Create the decision channel. Capacity is one: a second request waits
/// until the first has been picked up.
pub fn decision_channel() -> (DecisionSender, mpsc::Receiver<DecisionRequest>) {
    let (tx, rx) = mpsc::channel(1);
    (DecisionSender { tx }, rx)
}

/// Asks the operator for decisions and waits for the answers
#[derive(Clone)]
pub struct DecisionSender {
    tx: mpsc::Sender<DecisionRequest>,
}

impl DecisionSender {
    /// Send a request and wait for the answer, giving up when `cancel` fires.
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        task_id: &str,
        requested_by: Role,
        message: impl Into<String>,
        content: Option<String>,
    ) -> Result<Decision, AgentError> {
        let (responder, answer) = oneshot::channel();
        let request = DecisionRequest {
            task_id: task_id.to_string(),
            requested_by,
            message: message.into(),
            content,
            responder,
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            sent = self.tx.send(request) => {
                sent.map_err(|_| AgentError::Execution("no operator is listening for decisions".to_string()))?;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            decision = answer => decision.map_err(|_| {
                AgentError::Execution("operator dropped the decision request".to_string())
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
