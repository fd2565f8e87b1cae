//! Observer channel renderer
//!
//! Drains every observer channel into an [`OutputWriter`] until the engine
//! reports the run is done or all senders are gone.

use std::sync::Arc;

use orchestrator::events::{
    CodeEvent, DoneEvent, HandoffEvent, HookNotification, ProgressEvent, TokenEvent,
};
use orchestrator::EventReceivers;

use super::{OutputEvent, OutputWriter};

/// What the renderer saw over a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSummary {
    pub done: Option<DoneEvent>,
    pub handoffs: usize,
    pub errors: Vec<String>,
    /// Highest running token total reported
    pub tokens: u64,
}

struct Renderer {
    output: Arc<dyn OutputWriter>,
    summary: RenderSummary,
}

impl Renderer {
    fn progress(&mut self, event: ProgressEvent) {
        self.output.write(OutputEvent::Progress {
            message: event.message,
            percent: event.percent,
        });
    }

    fn handoff(&mut self, event: HandoffEvent) {
        self.summary.handoffs += 1;
        self.output.write(OutputEvent::Handoff {
            from: event.from,
            to: event.to,
            reason: event.reason,
        });
    }

    fn tokens(&mut self, event: TokenEvent) {
        self.summary.tokens = self.summary.tokens.max(event.total);
        self.output.write(OutputEvent::Tokens {
            role: event.role,
            tokens: event.tokens,
            total: event.total,
        });
    }

    fn code(&mut self, event: CodeEvent) {
        self.output.write(OutputEvent::Code {
            role: event.role,
            code: event.code,
        });
    }

    fn hook(&mut self, event: HookNotification) {
        self.output.write(OutputEvent::Checkpoint {
            phase: event.phase,
            role: event.role,
            paused: event.paused,
            can_skip: event.can_skip,
        });
    }

    fn error(&mut self, message: String) {
        self.output.write(OutputEvent::Error(message.clone()));
        self.summary.errors.push(message);
    }

    /// Everything still buffered once `done` arrived
    fn drain(&mut self, rx: &mut EventReceivers) {
        while let Ok(event) = rx.progress.try_recv() {
            self.progress(event);
        }
        while let Ok(event) = rx.hooks.try_recv() {
            self.hook(event);
        }
        while let Ok(event) = rx.code.try_recv() {
            self.code(event);
        }
        while let Ok(event) = rx.tokens.try_recv() {
            self.tokens(event);
        }
        while let Ok(event) = rx.handoffs.try_recv() {
            self.handoff(event);
        }
        while let Ok(message) = rx.errors.try_recv() {
            self.error(message);
        }
    }
}

/// Render observer events until the run finishes
pub async fn render_events(mut rx: EventReceivers, output: Arc<dyn OutputWriter>) -> RenderSummary {
    let mut renderer = Renderer {
        output,
        summary: RenderSummary::default(),
    };

    loop {
        tokio::select! {
            Some(event) = rx.progress.recv() => renderer.progress(event),
            Some(event) = rx.hooks.recv() => renderer.hook(event),
            Some(event) = rx.code.recv() => renderer.code(event),
            Some(event) = rx.tokens.recv() => renderer.tokens(event),
            Some(event) = rx.handoffs.recv() => renderer.handoff(event),
            Some(message) = rx.errors.recv() => renderer.error(message),
            Some(done) = rx.done.recv() => {
                renderer.drain(&mut rx);
                renderer.summary.done = Some(done);
                break;
            }
            else => break,
        }
    }

    renderer.output.flush();
    renderer.summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::MockOutput;
    use orchestrator::{observer_channels, HookPhase, NextRole, Role};

    #[tokio::test]
    async fn test_renders_until_done() {
        let (events, rx) = observer_channels(16);
        let mock = MockOutput::default();

        events.progress("agent", 10, "architect working");
        events.handoff("t1", Role::Architect, NextRole::Continue(Role::Implementer), "design ready");
        events.tokens(Role::Architect, 40, 40);
        events.code(Role::Implementer, "fn main() {}");
        events.hook(HookPhase::PreAgent, Role::Implementer, true, true);
        events.error("reviewer agent failed: boom");
        events.done("t1", false);

        let summary = render_events(rx, Arc::new(mock.clone())).await;

        assert_eq!(
            summary.done,
            Some(DoneEvent {
                task_id: "t1".to_string(),
                success: false
            })
        );
        assert_eq!(summary.handoffs, 1);
        assert_eq!(summary.tokens, 40);
        assert_eq!(summary.errors, vec!["reviewer agent failed: boom".to_string()]);

        let rendered = mock.events();
        assert_eq!(rendered.len(), 6);
        assert!(rendered.contains(&OutputEvent::Checkpoint {
            phase: HookPhase::PreAgent,
            role: Role::Implementer,
            paused: true,
            can_skip: true,
        }));
    }

    #[tokio::test]
    async fn test_stops_when_senders_dropped() {
        let (events, rx) = observer_channels(4);
        let mock = MockOutput::default();
        events.progress("start", 0, "starting");
        drop(events);

        let summary = render_events(rx, Arc::new(mock.clone())).await;
        assert!(summary.done.is_none());
        assert_eq!(mock.events().len(), 1);
    }
}
