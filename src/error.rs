//! # Error types used by the supervisor and component lifecycle.
//!
//! Everything the crate can report funnels into a single [`LifecycleError`]
//! enum:
//!
//! - [`LifecycleError::Component`] attributes a failure to a named component
//!   at a specific lifecycle [`Stage`].
//! - [`LifecycleError::Timeout`] is raised when one of the per-call deadlines
//!   fires; the [`TimeoutSource`] tag identifies *which* deadline.
//! - [`LifecycleError::Fail`] carries errors returned by user callbacks.
//! - The remaining variants are lifecycle sentinels produced by the
//!   wait-ready loop, the shutdown sweep, and the exit monitor.
//!
//! Helper methods follow the conventions of the rest of the codebase:
//! `as_label` for a stable log/metrics label, `is_deadline_exceeded` for the
//! "was this ultimately a deadline?" category check, and `root_cause` to peel
//! off the component attribution.

use std::fmt;

use thiserror::Error;

/// Lifecycle stage a component failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The start phase: spawning the run task.
    Startup,
    /// The readiness-probe loop between start and steady state.
    WaitReady,
    /// The reverse-order shutdown sweep.
    Shutdown,
    /// The run task returned (or died) on its own.
    RunExited,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Startup => "startup",
            Stage::WaitReady => "wait-ready",
            Stage::Shutdown => "shutdown",
            Stage::RunExited => "run-exited",
        })
    }
}

/// Identifies which configured deadline produced a [`LifecycleError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    /// The user `shutdown` callback did not return in time.
    ShutdownCall,
    /// The run task did not exit within the overall shutdown bound.
    ShutdownCompletion,
    /// The synthesized start call did not return in time.
    StartStopStart,
    /// The synthesized stop call did not return in time.
    StartStopStop,
    /// A single `check_ready` probe did not return in time.
    CheckReadyCall,
}

impl fmt::Display for TimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutSource::ShutdownCall => "Shutdown.CallTimeout",
            TimeoutSource::ShutdownCompletion => "Shutdown.CompletionTimeout",
            TimeoutSource::StartStopStart => "StartStopWrapper.StartTimeout",
            TimeoutSource::StartStopStop => "StartStopWrapper.StopTimeout",
            TimeoutSource::CheckReadyCall => "CheckReady.CallTimeout",
        })
    }
}

/// # Errors produced by the supervisor, its components, and user callbacks.
///
/// The supervisor records these in arrival order; the first recorded error is
/// the one [`wait`](crate::Supervisor::wait) and [`err`](crate::Supervisor::err)
/// report as the cause of shutdown.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A failure attributed to a named component at a lifecycle stage.
    #[error("component {name} {stage}: {source}")]
    Component {
        /// The component name given to `launch`.
        name: String,
        /// The stage the failure occurred in.
        stage: Stage,
        /// The underlying error.
        #[source]
        source: Box<LifecycleError>,
    },

    /// A configured deadline fired.
    #[error("deadline exceeded: {0}")]
    Timeout(TimeoutSource),

    /// Cancelled by the ambient context without a more specific cause.
    #[error("context canceled")]
    Canceled,

    /// An error returned by user code.
    #[error("{reason}")]
    Fail {
        /// Human-readable description supplied by the callback.
        reason: String,
    },

    /// The component's run task exited while wait-ready was still probing it.
    #[error("component exited")]
    WaitReadyComponentExited,

    /// The readiness probe never reported ready within the attempt budget.
    #[error("did not become ready within max attempts")]
    WaitReadyExceededMaxAttempts,

    /// The controller began dying while wait-ready was still in progress.
    #[error("wait-ready abort requested")]
    WaitReadyAborted,

    /// The component ignored both the shutdown call and run cancellation.
    #[error("failed to respond to both shutdown call and cancellation; abandoning it")]
    ShutdownAbandoned,

    /// The exit monitor gave up while the run task was still alive.
    #[error("monitor exiting while the component is still alive")]
    MonitorExitedWhileStillAlive,

    /// A task terminated without publishing a result value.
    #[error("channel closed without sending a result value")]
    PrematureChannelClose,
}

impl LifecycleError {
    /// Wraps an error produced by user code.
    pub fn fail(reason: impl Into<String>) -> Self {
        LifecycleError::Fail {
            reason: reason.into(),
        }
    }

    /// Attributes `source` to a named component at `stage`.
    pub fn component(name: impl Into<String>, stage: Stage, source: LifecycleError) -> Self {
        LifecycleError::Component {
            name: name.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::Component { .. } => "component",
            LifecycleError::Timeout(_) => "deadline_exceeded",
            LifecycleError::Canceled => "canceled",
            LifecycleError::Fail { .. } => "user_failure",
            LifecycleError::WaitReadyComponentExited => "wait_ready_component_exited",
            LifecycleError::WaitReadyExceededMaxAttempts => "wait_ready_exceeded_max_attempts",
            LifecycleError::WaitReadyAborted => "wait_ready_aborted",
            LifecycleError::ShutdownAbandoned => "shutdown_abandoned",
            LifecycleError::MonitorExitedWhileStillAlive => "monitor_exited_while_still_alive",
            LifecycleError::PrematureChannelClose => "premature_channel_close",
        }
    }

    /// True when the error is, or wraps, a fired deadline.
    ///
    /// This is the category check callers should use instead of matching a
    /// specific [`TimeoutSource`].
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root_cause(), LifecycleError::Timeout(_))
    }

    /// Peels off [`LifecycleError::Component`] attribution layers and returns
    /// the innermost error.
    pub fn root_cause(&self) -> &LifecycleError {
        let mut cur = self;
        while let LifecycleError::Component { source, .. } = cur {
            cur = source;
        }
        cur
    }

    /// The deadline tag, if the error chain bottoms out in a timeout.
    pub fn timeout_source(&self) -> Option<TimeoutSource> {
        match self.root_cause() {
            LifecycleError::Timeout(source) => Some(*source),
            _ => None,
        }
    }
}
