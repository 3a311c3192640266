//! # Component specifications.
//!
//! A [`ComponentSpec`] is the immutable description of one component: how it
//! runs, how it is asked to stop, and (optionally) how the supervisor probes
//! it for readiness before admitting the next component.
//!
//! Exactly one execution mode is chosen at construction:
//!
//! - [`ComponentSpec::run`] — a blocking work function paired with a shutdown
//!   request function (the native contract);
//! - [`ComponentSpec::start_stop`] — a pair of non-blocking phase functions
//!   from which the crate synthesizes the run/shutdown pair.
//!
//! All remaining options are fluent methods with sensible defaults: every
//! timeout defaults to [`NO_TIMEOUT`], the readiness backoff to a constant
//! zero delay, and the attempt budget to "unbounded".
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use appvisor::{const_backoff, ComponentSpec};
//!
//! let spec = ComponentSpec::start_stop(
//!     |_ctx| async { Ok(()) },
//!     |_ctx| async { Ok(()) },
//! )
//! .start_stop_call_timeouts(Duration::from_secs(10), Duration::from_secs(10))
//! .check_ready(|_ctx| async { Ok(true) })
//! .check_ready_backoff(const_backoff(Duration::from_millis(200)))
//! .check_ready_max_attempts(25);
//! # let _ = spec;
//! ```

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::backoff::{const_backoff, BackoffFn};
use crate::ctx::Ctx;
use crate::error::LifecycleError;

/// Sentinel "effectively never" duration (about 50 years).
///
/// Deadlines configured with this value behave as "no timeout" while staying
/// an ordinary, representable [`Duration`].
pub const NO_TIMEOUT: Duration = Duration::from_secs(50 * 365 * 24 * 60 * 60);

/// Boxed one-shot lifecycle operation (`run`, `shutdown`, `start`, `stop`).
pub(crate) type OpFn = Box<
    dyn FnOnce(Ctx) -> BoxFuture<'static, Result<(), LifecycleError>> + Send + Sync + 'static,
>;

/// Boxed readiness probe, re-invoked once per attempt.
pub(crate) type CheckReadyFn = Box<
    dyn FnMut(Ctx) -> BoxFuture<'static, Result<bool, LifecycleError>> + Send + Sync + 'static,
>;

pub(crate) enum Mode {
    Run {
        run: OpFn,
        shutdown: OpFn,
    },
    StartStop {
        start: OpFn,
        stop: OpFn,
        start_timeout: Duration,
        stop_timeout: Duration,
    },
}

/// Immutable description of a component, consumed by
/// [`Supervisor::launch`](crate::Supervisor::launch).
pub struct ComponentSpec {
    pub(crate) mode: Mode,
    pub(crate) shutdown_call_timeout: Duration,
    pub(crate) shutdown_completion_timeout: Duration,
    pub(crate) check_ready: Option<CheckReadyFn>,
    pub(crate) check_ready_call_timeout: Duration,
    pub(crate) check_ready_backoff: BackoffFn,
    pub(crate) check_ready_max_attempts: usize,
}

impl ComponentSpec {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            shutdown_call_timeout: NO_TIMEOUT,
            shutdown_completion_timeout: NO_TIMEOUT,
            check_ready: None,
            check_ready_call_timeout: NO_TIMEOUT,
            check_ready_backoff: const_backoff(Duration::ZERO),
            check_ready_max_attempts: usize::MAX,
        }
    }

    /// Describes a component with the native run/shutdown contract.
    ///
    /// `run` executes the component and returns when it exits; `shutdown`
    /// asks it to stop. The run function receives a [`Ctx`] it should watch
    /// for cancellation.
    pub fn run<R, RFut, S, SFut>(run: R, shutdown: S) -> Self
    where
        R: FnOnce(Ctx) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
        S: FnOnce(Ctx) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        Self::with_mode(Mode::Run {
            run: box_op(run),
            shutdown: box_op(shutdown),
        })
    }

    /// Describes a component through non-blocking `start` and `stop` phase
    /// functions; the crate synthesizes the run/shutdown pair from them.
    pub fn start_stop<R, RFut, S, SFut>(start: R, stop: S) -> Self
    where
        R: FnOnce(Ctx) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
        S: FnOnce(Ctx) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        Self::with_mode(Mode::StartStop {
            start: box_op(start),
            stop: box_op(stop),
            start_timeout: NO_TIMEOUT,
            stop_timeout: NO_TIMEOUT,
        })
    }

    /// Bounds a single invocation of the user `shutdown` callback.
    /// Zero means [`NO_TIMEOUT`].
    pub fn shutdown_call_timeout(mut self, d: Duration) -> Self {
        self.shutdown_call_timeout = or_no_timeout(d);
        self
    }

    /// Bounds the overall time between asking a component to shut down and
    /// observing its run function return. Zero means [`NO_TIMEOUT`].
    pub fn shutdown_completion_timeout(mut self, d: Duration) -> Self {
        self.shutdown_completion_timeout = or_no_timeout(d);
        self
    }

    /// Bounds the synthesized `start` and `stop` calls of a
    /// [`start_stop`](ComponentSpec::start_stop) component. Zero means
    /// [`NO_TIMEOUT`]. Ignored for [`run`](ComponentSpec::run) components.
    pub fn start_stop_call_timeouts(mut self, start_d: Duration, stop_d: Duration) -> Self {
        if let Mode::StartStop {
            start_timeout,
            stop_timeout,
            ..
        } = &mut self.mode
        {
            *start_timeout = or_no_timeout(start_d);
            *stop_timeout = or_no_timeout(stop_d);
        }
        self
    }

    /// Installs a readiness probe, gating the launch of subsequent components
    /// until it reports ready.
    ///
    /// The probe returns `Ok(true)` when the component is ready, `Ok(false)`
    /// to retry after the configured backoff, or an error to abort the
    /// launch. Without a probe the component is considered immediately ready.
    ///
    /// # Panics
    /// Panics when called twice — a spec carries at most one probe.
    pub fn check_ready<F, Fut>(mut self, probe: F) -> Self
    where
        F: FnMut(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, LifecycleError>> + Send + 'static,
    {
        if self.check_ready.is_some() {
            panic!("ComponentSpec: check_ready configured twice; must be zero or one");
        }
        let mut probe = probe;
        self.check_ready = Some(Box::new(
            move |ctx| -> BoxFuture<'static, Result<bool, LifecycleError>> {
                Box::pin(probe(ctx))
            },
        ));
        self
    }

    /// Bounds a single readiness probe invocation. Zero means [`NO_TIMEOUT`].
    pub fn check_ready_call_timeout(mut self, d: Duration) -> Self {
        self.check_ready_call_timeout = or_no_timeout(d);
        self
    }

    /// Sets the generator producing the delay between readiness attempts.
    /// Defaults to no delay.
    pub fn check_ready_backoff<B>(mut self, backoff: B) -> Self
    where
        B: FnMut() -> Duration + Send + Sync + 'static,
    {
        self.check_ready_backoff = Box::new(backoff);
        self
    }

    /// Caps the number of readiness attempts. Zero means unbounded.
    pub fn check_ready_max_attempts(mut self, n: usize) -> Self {
        self.check_ready_max_attempts = if n == 0 { usize::MAX } else { n };
        self
    }

    /// Applies a reusable bundle of options.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use appvisor::ComponentSpec;
    ///
    /// fn tight_shutdown(spec: ComponentSpec) -> ComponentSpec {
    ///     spec.shutdown_call_timeout(Duration::from_secs(1))
    ///         .shutdown_completion_timeout(Duration::from_secs(5))
    /// }
    ///
    /// let spec = ComponentSpec::run(
    ///     |ctx| async move { ctx.cancelled().await; Ok(()) },
    ///     |_ctx| async { Ok(()) },
    /// )
    /// .bundle(tight_shutdown);
    /// # let _ = spec;
    /// ```
    pub fn bundle<F>(self, opts: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        opts(self)
    }
}

fn box_op<F, Fut>(f: F) -> OpFn
where
    F: FnOnce(Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
{
    Box::new(move |ctx| -> BoxFuture<'static, Result<(), LifecycleError>> { Box::pin(f(ctx)) })
}

fn or_no_timeout(d: Duration) -> Duration {
    if d.is_zero() {
        NO_TIMEOUT
    } else {
        d
    }
}
