//! # Lifecycle events published on the supervisor's bus.
//!
//! Every noteworthy transition — a launch being accepted or discarded, a
//! component starting, becoming ready, exiting, failing, being shut down —
//! is published as an [`Event`] and delivered to the configured
//! [`Observer`](crate::Observer).

use std::time::{Duration, SystemTime};

use crate::error::Stage;

/// Discriminates what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `request_stop` fired for the first time.
    ShutdownRequested,
    /// A launch request was discarded because the supervisor is dying or dead.
    LaunchDiscarded,
    /// A component is about to be started.
    ComponentStarting,
    /// A component finished its readiness gate.
    ComponentReady,
    /// A component's run task returned.
    ComponentExited,
    /// An error was recorded against a component.
    ComponentFailed,
    /// A component finished its shutdown phase.
    ComponentShutdown,
    /// A readiness retry was scheduled.
    BackoffScheduled,
    /// The reverse-order shutdown sweep has completed.
    AllStopped,
}

/// A single lifecycle event with optional payload fields.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Wall-clock time the event was created.
    pub at: SystemTime,
    /// Component the event concerns, if any.
    pub component: Option<String>,
    /// Lifecycle stage, for failure events.
    pub stage: Option<Stage>,
    /// Rendered error, for failure events.
    pub error: Option<String>,
    /// Readiness attempt number, for backoff events.
    pub attempt: Option<u64>,
    /// Scheduled delay, for backoff events.
    pub delay: Option<Duration>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            component: None,
            stage: None,
            error: None,
            attempt: None,
            delay: None,
        }
    }

    /// Sets the component name.
    pub fn with_component(mut self, name: impl Into<String>) -> Self {
        self.component = Some(name.into());
        self
    }

    /// Sets the lifecycle stage.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Sets the rendered error.
    pub fn with_error(mut self, err: impl Into<String>) -> Self {
        self.error = Some(err.into());
        self
    }

    /// Sets the attempt counter.
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Sets the scheduled delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }
}
