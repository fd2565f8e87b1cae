//! Hook registry and control-signal state machine
//!
//! Signals are applied on two paths. The flags (`paused`, `step_mode`,
//! `killed`) are updated synchronously under one lock, so anything polling
//! them sees the effect immediately. The signal is also pushed onto a small
//! bounded queue that wakes a workflow blocked in a pause. When the queue is
//! full the oldest entry is dropped: senders never block and the latest
//! signal always gets through.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::types::{ControlSignal, HookEvent, HookHandler, HookPhase, HookResult};
use crate::events::WorkflowEvents;

/// Default number of undelivered signals kept before the oldest is dropped
pub const DEFAULT_SIGNAL_QUEUE_CAPACITY: usize = 10;

const DEFAULT_KILL_REASON: &str = "killed by operator";
const DEFAULT_SKIP_REASON: &str = "skipped by operator";

/// Handle returned by [`HookController::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct Registration {
    id: HookId,
    priority: i32,
    handler: HookHandler,
}

struct QueuedSignal {
    signal: ControlSignal,
    reason: Option<String>,
}

struct ControlState {
    paused: bool,
    step_mode: bool,
    killed: bool,
    kill_reason: Option<String>,
    /// Pause automatically after a stepped agent finishes
    auto_step_pause: bool,
    queue: VecDeque<QueuedSignal>,
    /// Operator skip waiting for the next agent, with its reason
    pending_skip: Option<String>,
    /// Fires on kill so an in-flight agent call can be abandoned
    kill_token: CancellationToken,
}

impl ControlState {
    fn new(auto_step_pause: bool) -> Self {
        Self {
            paused: false,
            step_mode: false,
            killed: false,
            kill_reason: None,
            auto_step_pause,
            queue: VecDeque::new(),
            pending_skip: None,
            kill_token: CancellationToken::new(),
        }
    }

    fn kill_result(&self) -> HookResult {
        HookResult::kill(
            self.kill_reason
                .clone()
                .unwrap_or_else(|| DEFAULT_KILL_REASON.to_string()),
        )
    }
}

/// Control plane consulted by the workflow loop at every checkpoint
pub struct HookController {
    hooks: Mutex<BTreeMap<HookPhase, Vec<Registration>>>,
    next_id: AtomicU64,
    state: Mutex<ControlState>,
    queue_capacity: usize,
    wakeup: Notify,
    events: RwLock<WorkflowEvents>,
}

impl Default for HookController {
    fn default() -> Self {
        Self::new()
    }
}

impl HookController {
    /// Create a controller with auto-pause after stepping enabled
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            state: Mutex::new(ControlState::new(true)),
            queue_capacity: DEFAULT_SIGNAL_QUEUE_CAPACITY,
            wakeup: Notify::new(),
            events: RwLock::new(WorkflowEvents::none()),
        }
    }

    /// Set how many undelivered signals are kept
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable pausing after a stepped agent
    pub fn with_auto_step_pause(self, enabled: bool) -> Self {
        self.lock_state().auto_step_pause = enabled;
        self
    }

    /// Attach observer channels for hook notifications
    pub fn set_events(&self, events: WorkflowEvents) {
        *self.events.write().unwrap_or_else(PoisonError::into_inner) = events;
    }

    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_hooks(&self) -> MutexGuard<'_, BTreeMap<HookPhase, Vec<Registration>>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observer(&self) -> WorkflowEvents {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a hook for a phase. Lower priorities run first; equal
    /// priorities run in registration order.
    pub fn register<F>(&self, phase: HookPhase, priority: i32, handler: F) -> HookId
    where
        F: Fn(&HookEvent) -> HookResult + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut hooks = self.lock_hooks();
        let list = hooks.entry(phase).or_default();
        list.push(Registration {
            id,
            priority,
            handler: std::sync::Arc::new(handler),
        });
        // Stable sort keeps registration order within a priority
        list.sort_by_key(|r| r.priority);

        tracing::debug!(%phase, priority, hook_id = id.0, "Registered hook");
        id
    }

    /// Remove a hook. Returns false if it was not registered.
    pub fn unregister(&self, id: HookId) -> bool {
        let mut hooks = self.lock_hooks();
        for list in hooks.values_mut() {
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                tracing::debug!(hook_id = id.0, "Unregistered hook");
                return true;
            }
        }
        false
    }

    /// Number of hooks registered for a phase
    pub fn hook_count(&self, phase: HookPhase) -> usize {
        self.lock_hooks().get(&phase).map_or(0, Vec::len)
    }

    // ------------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------------

    /// Deliver a control signal. Never blocks.
    pub fn send_signal(&self, signal: ControlSignal) {
        self.send_signal_with_reason(signal, None);
    }

    /// Deliver a control signal with a human-readable reason. Never blocks.
    pub fn send_signal_with_reason(&self, signal: ControlSignal, reason: Option<String>) {
        {
            let mut state = self.lock_state();
            match signal {
                ControlSignal::Pause => state.paused = true,
                ControlSignal::Resume => state.paused = false,
                ControlSignal::Kill => {
                    state.killed = true;
                    if state.kill_reason.is_none() {
                        state.kill_reason = reason.clone();
                    }
                    state.kill_token.cancel();
                }
                ControlSignal::Step => {
                    state.step_mode = true;
                    state.paused = false;
                }
                ControlSignal::Skip => {}
            }

            if state.queue.len() >= self.queue_capacity {
                if let Some(dropped) = state.queue.pop_front() {
                    tracing::debug!(dropped = %dropped.signal, "Signal queue full, dropping oldest");
                }
            }
            state.queue.push_back(QueuedSignal { signal, reason });
        }

        tracing::info!(%signal, "Control signal received");
        self.wakeup.notify_one();
    }

    /// Clear all flags and pending signals. Called at the start of every run.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        let auto_step_pause = state.auto_step_pause;
        *state = ControlState::new(auto_step_pause);
        tracing::debug!("Hook controller reset");
    }

    pub fn is_paused(&self) -> bool {
        self.lock_state().paused
    }

    pub fn is_killed(&self) -> bool {
        self.lock_state().killed
    }

    pub fn is_step_mode(&self) -> bool {
        self.lock_state().step_mode
    }

    /// Signals waiting to be consumed by the workflow
    pub fn pending_signals(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Token that fires when a kill signal arrives. Re-armed by [`reset`].
    ///
    /// [`reset`]: HookController::reset
    pub fn kill_token(&self) -> CancellationToken {
        self.lock_state().kill_token.clone()
    }

    /// Reason given with the kill signal, if the run was killed
    pub fn kill_reason(&self) -> Option<String> {
        let state = self.lock_state();
        state.killed.then(|| {
            state
                .kill_reason
                .clone()
                .unwrap_or_else(|| DEFAULT_KILL_REASON.to_string())
        })
    }

    fn pop_signal(&self) -> Option<QueuedSignal> {
        self.lock_state().queue.pop_front()
    }

    /// Whether an operator skip is waiting for the next agent
    pub fn has_pending_skip(&self) -> bool {
        self.lock_state().pending_skip.is_some()
    }

    /// Turn a queued signal into the result it produces at `phase`.
    ///
    /// A skip only applies to an agent. Anywhere else it is held until the
    /// next [`HookPhase::PreAgent`] checkpoint and the run continues.
    fn signal_result(&self, phase: HookPhase, queued: QueuedSignal) -> HookResult {
        match queued.signal {
            ControlSignal::Kill => HookResult::kill(
                queued.reason.unwrap_or_else(|| DEFAULT_KILL_REASON.to_string()),
            ),
            ControlSignal::Skip => {
                let reason = queued.reason.unwrap_or_else(|| DEFAULT_SKIP_REASON.to_string());
                if phase == HookPhase::PreAgent {
                    HookResult::skip(reason)
                } else {
                    tracing::debug!(%phase, "Holding skip for the next agent");
                    self.lock_state().pending_skip = Some(reason);
                    HookResult::proceed()
                }
            }
            ControlSignal::Pause | ControlSignal::Resume | ControlSignal::Step => {
                HookResult::proceed()
            }
        }
    }

    fn take_pending_skip(&self) -> Option<HookResult> {
        self.lock_state().pending_skip.take().map(HookResult::skip)
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    /// Checkpoint for the workflow loop.
    ///
    /// Consumes at most one pending signal, honours kill, held skips and
    /// pause, then runs the hooks registered for `phase`. Blocks only while
    /// paused; `cancel` firing during that wait yields a kill result.
    pub async fn emit(
        &self,
        phase: HookPhase,
        event: HookEvent,
        cancel: &CancellationToken,
    ) -> HookResult {
        let role = event.role;
        let can_skip = phase == HookPhase::PreAgent;
        self.observer().hook(phase, role, self.is_paused(), can_skip);

        if let Some(queued) = self.pop_signal() {
            let result = self.signal_result(phase, queued);
            if !result.is_continue() {
                return result;
            }
        }

        {
            let state = self.lock_state();
            if state.killed {
                return state.kill_result();
            }
        }

        if phase == HookPhase::PreAgent {
            if let Some(skip) = self.take_pending_skip() {
                return skip;
            }
        }

        if self.is_paused() {
            let result = self.wait_for_resume(phase, role, can_skip, cancel).await;
            if !result.is_continue() {
                return result;
            }
        }

        let result = self.run_hooks(event);
        if !result.is_continue() {
            return result;
        }

        if phase == HookPhase::PostAgent {
            let mut state = self.lock_state();
            if state.step_mode && state.auto_step_pause {
                state.paused = true;
                state.step_mode = false;
                tracing::info!("Step complete, pausing");
            }
        }

        result
    }

    /// Run hooks without consulting signals or pause state.
    /// Used once a run is over and nothing is left to steer.
    pub fn dispatch(&self, event: HookEvent) -> HookResult {
        self.run_hooks(event)
    }

    async fn wait_for_resume(
        &self,
        phase: HookPhase,
        role: crate::types::Role,
        can_skip: bool,
        cancel: &CancellationToken,
    ) -> HookResult {
        tracing::info!(%phase, %role, "Workflow paused");
        self.observer().hook(phase, role, true, can_skip);

        loop {
            // Register interest before checking state so a signal sent in
            // between is not missed.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.lock_state();
                if state.killed {
                    return state.kill_result();
                }
                if !state.paused {
                    tracing::info!(%phase, "Workflow resumed");
                    return HookResult::proceed();
                }
            }

            if let Some(queued) = self.pop_signal() {
                match queued.signal {
                    ControlSignal::Pause => {}
                    ControlSignal::Resume | ControlSignal::Step => return HookResult::proceed(),
                    ControlSignal::Kill | ControlSignal::Skip => {
                        let result = self.signal_result(phase, queued);
                        if !result.is_continue() {
                            return result;
                        }
                    }
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(%phase, "Cancelled while paused");
                    return HookResult::kill("workflow cancelled while paused");
                }
                _ = &mut notified => {}
            }
        }
    }

    fn run_hooks(&self, mut event: HookEvent) -> HookResult {
        let handlers: Vec<HookHandler> = self
            .lock_hooks()
            .get(&event.phase)
            .map(|list| list.iter().map(|r| r.handler.clone()).collect())
            .unwrap_or_default();

        let mut accumulated = HookResult::proceed();
        for handler in handlers {
            let result = handler(&event);
            if !result.is_continue() {
                tracing::debug!(phase = %event.phase, action = ?result.action, "Hook short-circuited");
                return result;
            }
            // Later hooks see, and may override, earlier replacements
            if let Some(handoff) = result.handoff {
                event.handoff = Some(handoff.clone());
                accumulated.handoff = Some(handoff);
            }
            if let Some(response) = result.response {
                event.response = Some(response.clone());
                accumulated.response = Some(response);
            }
        }

        accumulated
    }
}

// ============================================================================
// Tests
// ============================================================================
