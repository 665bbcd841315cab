//! Session event channel
//!
//! The engine never calls into presentation code. It publishes
//! [`SessionEvent`]s and any number of subscribers read them from their own
//! channel, in emission order. Bounded subscribers miss events published while full.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use uuid::Uuid;

use super::state::{EndReason, SessionState};
use crate::capture::CompletionSource;
use crate::grid::GridCell;

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// Events broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // --- Lifecycle ---
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Whole seconds left, sent on every countdown tick
    Countdown { remaining_secs: u64 },
    FinalWindowEntered,
    Paused,
    Resumed,
    /// Artifact assembled; fetch it with `Session::artifact`
    Completed {
        artifact_id: Uuid,
        reason: EndReason,
        source: CompletionSource,
    },

    // --- Guidance ---
    HintShown { index: usize, text: String },
    HintHidden { index: usize },

    // --- Scene ---
    CellActivated {
        cell: GridCell,
        previous_row: Option<usize>,
    },
    SparkSpawned { cell: GridCell },
    RibbonBuilt { bands_touched: usize },

    // --- Diagnostics ---
    Diagnostic {
        level: DiagnosticLevel,
        message: String,
    },
}

/// Fan-out of session events to every live subscriber
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<SessionEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new unbounded subscription.
    ///
    /// Every event is queued until received, so a receiver that is kept but
    /// never drained grows for the life of the session.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (sender, receiver) = channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Open a subscription holding at most `capacity` undelivered events.
    /// Events published while it is full are dropped for that subscriber only.
    pub fn subscribe_bounded(&mut self, capacity: usize) -> Receiver<SessionEvent> {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        self.subscribers.push(sender);
        receiver
    }

    /// Send to every subscriber, dropping those whose receiver is gone
    pub fn publish(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|s| !matches!(s.try_send(event.clone()), Err(TrySendError::Disconnected(_))));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
