//! # appvisor
//!
//! **Appvisor** is an in-process application lifecycle supervisor.
//!
//! An application registers its long-lived components — servers, connection
//! pools, signal listeners, timers — and the supervisor brings them up in
//! declared order, waits for each to become ready before admitting the next,
//! keeps them alive, and shuts everything down in reverse order (with bounded,
//! best-effort guarantees) as soon as any one of them exits or a stop is
//! requested. App instance replacement is assumed to be provided externally
//! (k8s, systemd, a process manager).
//!
//! ## Features
//!
//! | Area            | Description                                                          | Key types                                 |
//! |-----------------|----------------------------------------------------------------------|-------------------------------------------|
//! | **Supervision** | Ordered launch, readiness gating, reverse-order graceful shutdown.   | [`Supervisor`]                             |
//! | **Components**  | Describe units as run/shutdown pairs or start/stop phase functions.  | [`ComponentSpec`]                          |
//! | **Cancellation**| Context with deadlines and typed cancellation causes.                | [`Ctx`], [`NO_TIMEOUT`]                    |
//! | **Readiness**   | Probe loops with pluggable retry backoff.                            | [`const_backoff`], [`exp_backoff`]         |
//! | **Errors**      | Typed lifecycle errors with stage attribution.                       | [`LifecycleError`], [`Stage`]              |
//! | **Observer API**| Hook into lifecycle events (logging, metrics, custom observers).     | [`Observer`], [`Event`], [`LoggerObserver`]|
//!
//! ```no_run
//! use std::time::Duration;
//! use appvisor::{ComponentSpec, Config, Ctx, LoggerObserver, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::new(Ctx::new(), Config::default(), LoggerObserver);
//!
//!     // A component with the native run/shutdown contract.
//!     let worker = ComponentSpec::run(
//!         |ctx| async move {
//!             // Do work until asked to stop.
//!             ctx.cancelled().await;
//!             Ok(())
//!         },
//!         |_ctx| async { Ok(()) },
//!     )
//!     .shutdown_call_timeout(Duration::from_secs(5))
//!     .shutdown_completion_timeout(Duration::from_secs(30));
//!
//!     sup.launch("worker", worker).await;
//!
//!     // Stop on the first termination signal.
//!     let _ = appvisor::wait_for_shutdown_signal().await;
//!     sup.request_stop(None);
//!
//!     if let Some(err) = sup.wait().await {
//!         eprintln!("exited with error: {err}");
//!     }
//! }
//! ```
//!
//! ---

mod backoff;
mod bus;
mod component;
mod config;
mod ctx;
mod error;
mod event;
mod observer;
mod os_signals;
mod spec;
mod supervisor;

// ---- Public re-exports ----

pub use backoff::{const_backoff, exp_backoff, BackoffFn};
pub use config::Config;
pub use ctx::Ctx;
pub use error::{LifecycleError, Stage, TimeoutSource};
pub use event::{Event, EventKind};
pub use observer::{LoggerObserver, Observer};
pub use os_signals::wait_for_shutdown_signal;
pub use spec::{ComponentSpec, NO_TIMEOUT};
pub use supervisor::Supervisor;
