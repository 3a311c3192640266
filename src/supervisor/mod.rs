//! # The supervisor: ordered launch, one shutdown cycle, collected errors.
//!
//! [`Supervisor`] owns an ordered list of components. Components are brought
//! up strictly in launch order, each gated on the previous one's readiness;
//! when any component exits — or an external stop request arrives — every
//! launched component is shut down in reverse order, errors are collected,
//! and [`Supervisor::wait`] unblocks with the first one.
//!
//! ```text
//!   New ──launch()──► Alive ──stop──► Dying ──drain + reverse sweep──► Dead
//!    │                                                                  ▲
//!    └── request_stop (nothing launched yet) ──────────────────────────-┘
//! ```
//!
//! All transitions except the New→Dead fast path are driven by a single
//! control-loop task (`control_loop.rs`). The supervisor hands each component
//! two capabilities — an error sink and an exit notifier — instead of a
//! reference to itself, so components can never reach back into controller
//! state.

mod control_loop;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::bus::Bus;
use crate::component::{Component, ErrorSink, ExitSink};
use crate::config::Config;
use crate::ctx::Ctx;
use crate::error::{LifecycleError, Stage};
use crate::event::{Event, EventKind};
use crate::observer::Observer;
use crate::spec::ComponentSpec;

/// Launch queue floor; a small buffer keeps launch bursts deadlock-free.
const MIN_LAUNCH_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    New,
    Alive,
    Dying,
    Dead,
}

pub(crate) struct LaunchRequest {
    pub(crate) name: String,
    pub(crate) component: Component,
    pub(crate) ack: oneshot::Sender<()>,
}

pub(crate) struct ControlState {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) errors: Vec<LifecycleError>,
}

pub(crate) struct Shared {
    pub(crate) ctx: Ctx,
    pub(crate) state: Mutex<ControlState>,
    pub(crate) stop: CancellationToken,
    pub(crate) done: CancellationToken,
    pub(crate) launch_tx: mpsc::Sender<LaunchRequest>,
    pub(crate) launch_rx: Mutex<Option<mpsc::Receiver<LaunchRequest>>>,
    pub(crate) bus: Bus,
    pub(crate) async_grace: Duration,
}

/// Application lifecycle supervisor.
///
/// Cheap to clone; all clones drive the same instance. See the
/// [crate-level docs](crate) for a full example.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Creates a supervisor rooted at `ctx` and wires `observer` to the
    /// event bus.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Panics
    /// Panics when `cfg` is out of its documented domain (a programmer
    /// error).
    pub fn new<O>(ctx: Ctx, cfg: Config, observer: O) -> Self
    where
        O: Observer + Send + Sync + 'static,
    {
        cfg.validate();

        let bus = Bus::new(cfg.bus_capacity);
        let mut events = bus.subscribe();
        let observer = Arc::new(observer);
        tokio::spawn(async move {
            while let Ok(ev) = events.recv().await {
                observer.on_event(&ev).await;
            }
        });

        let (launch_tx, launch_rx) =
            mpsc::channel(cfg.launch_queue_capacity.max(MIN_LAUNCH_QUEUE_CAPACITY));

        Supervisor {
            shared: Arc::new(Shared {
                ctx,
                state: Mutex::new(ControlState {
                    lifecycle: Lifecycle::New,
                    errors: Vec::new(),
                }),
                stop: CancellationToken::new(),
                done: CancellationToken::new(),
                launch_tx,
                launch_rx: Mutex::new(Some(launch_rx)),
                bus,
                async_grace: cfg.async_grace,
            }),
        }
    }

    /// Builds a component from `spec` and launches it.
    ///
    /// Returns once the launch has been fully processed: the component
    /// started and passed its readiness gate, failed doing so, or was
    /// discarded because shutdown had already begun.
    ///
    /// # Panics
    /// Panics on an empty `name` (a programmer error).
    pub async fn launch(&self, name: impl Into<String>, spec: ComponentSpec) {
        let name = name.into();
        if name.is_empty() {
            panic!("Supervisor::launch: component name must not be empty");
        }

        let error_log: ErrorSink = {
            let shared = Arc::clone(&self.shared);
            let name = name.clone();
            Arc::new(move |stage, err| shared.record_error(&name, stage, err))
        };
        let notify_exited: ExitSink = {
            let shared = Arc::clone(&self.shared);
            let name = name.clone();
            Arc::new(move |err| {
                if let Some(err) = err {
                    shared.record_error(&name, Stage::RunExited, err);
                }
                shared.request_stop(None);
            })
        };
        let component = Component::new(
            &name,
            spec,
            self.shared.async_grace,
            error_log,
            notify_exited,
            self.shared.bus.clone(),
        );

        let (ack_tx, ack_rx) = oneshot::channel();
        let accepted = {
            let mut state = self.shared.lock_state();
            match state.lifecycle {
                Lifecycle::New => {
                    state.lifecycle = Lifecycle::Alive;
                    let rx = self
                        .shared
                        .launch_rx
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    if let Some(rx) = rx {
                        tokio::spawn(control_loop::run(Arc::clone(&self.shared), rx));
                    }
                    true
                }
                Lifecycle::Alive => true,
                Lifecycle::Dying | Lifecycle::Dead => false,
            }
        };

        if accepted {
            let req = LaunchRequest {
                name,
                component,
                ack: ack_tx,
            };
            // The send happens outside the state lock; if the control loop
            // has already drained and dropped the queue, ack ourselves.
            if let Err(mpsc::error::SendError(req)) = self.shared.launch_tx.send(req).await {
                self.shared
                    .bus
                    .publish(Event::now(EventKind::LaunchDiscarded).with_component(&req.name));
                let _ = req.ack.send(());
            }
        } else {
            self.shared
                .bus
                .publish(Event::now(EventKind::LaunchDiscarded).with_component(&name));
            let _ = ack_tx.send(());
        }

        let _ = ack_rx.await;
    }

    /// Signals that it is time to shut down, with an optional reason.
    ///
    /// Idempotent; every non-nil reason is recorded, and the first recorded
    /// error (from any source) is the one [`err`](Supervisor::err) reports.
    pub fn request_stop(&self, reason: Option<LifecycleError>) {
        self.shared.request_stop(reason);
    }

    /// Blocks until the shutdown cycle has fully completed, then returns
    /// [`err`](Supervisor::err).
    pub async fn wait(&self) -> Option<LifecycleError> {
        self.shared.done.cancelled().await;
        self.err()
    }

    /// The first recorded error, or `None`. Stable once set.
    pub fn err(&self) -> Option<LifecycleError> {
        self.shared.lock_state().errors.first().cloned()
    }

    /// Every recorded error, in order of first occurrence.
    pub fn all_errors(&self) -> Vec<LifecycleError> {
        self.shared.lock_state().errors.clone()
    }
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wraps `err` with component attribution and appends it.
    pub(crate) fn record_error(&self, name: &str, stage: Stage, err: LifecycleError) {
        let wrapped = LifecycleError::component(name, stage, err);
        self.bus.publish(
            Event::now(EventKind::ComponentFailed)
                .with_component(name)
                .with_stage(stage)
                .with_error(wrapped.to_string()),
        );
        self.lock_state().errors.push(wrapped);
    }

    pub(crate) fn request_stop(&self, reason: Option<LifecycleError>) {
        let mut state = self.lock_state();
        if let Some(reason) = reason {
            state.errors.push(reason);
        }

        if !self.stop.is_cancelled() {
            self.stop.cancel();
            self.bus.publish(Event::now(EventKind::ShutdownRequested));
        }

        // The only supported abnormal transition: nothing was ever launched,
        // so there is no control loop to drive Alive→Dying→Dead.
        if state.lifecycle == Lifecycle::New {
            state.lifecycle = Lifecycle::Dead;
            drop(
                self.launch_rx
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take(),
            );
            self.done.cancel();
        }
    }

    pub(crate) fn set_lifecycle(&self, from: Lifecycle, to: Lifecycle) {
        let mut state = self.lock_state();
        if state.lifecycle != from {
            panic!(
                "internal: lifecycle transition to {:?} from {:?}, expected {:?}",
                to, state.lifecycle, from
            );
        }
        state.lifecycle = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LoggerObserver;

    fn new_supervisor() -> Supervisor {
        Supervisor::new(Ctx::new(), Config::default(), LoggerObserver)
    }

    #[tokio::test]
    async fn request_stop_is_idempotent_and_first_error_sticks() {
        let sup = new_supervisor();
        assert_eq!(sup.err(), None);

        sup.request_stop(None);
        assert_eq!(sup.err(), None);

        sup.request_stop(Some(LifecycleError::fail("first")));
        sup.request_stop(Some(LifecycleError::fail("second")));
        sup.request_stop(None);

        assert_eq!(sup.err(), Some(LifecycleError::fail("first")));
        assert_eq!(
            sup.all_errors(),
            vec![LifecycleError::fail("first"), LifecycleError::fail("second")]
        );
    }

    #[tokio::test]
    async fn stop_before_any_launch_takes_the_fast_path_to_dead() {
        let sup = new_supervisor();
        sup.request_stop(Some(LifecycleError::fail("early exit")));

        assert_eq!(sup.shared.lock_state().lifecycle, Lifecycle::Dead);
        assert!(sup.shared.done.is_cancelled());
        // wait() must not block.
        assert_eq!(sup.wait().await, Some(LifecycleError::fail("early exit")));
    }

    #[tokio::test]
    async fn launch_after_death_is_discarded_without_blocking() {
        let sup = new_supervisor();
        sup.request_stop(None);

        sup.launch(
            "late",
            ComponentSpec::run(
                |_ctx| async { panic!("must not start") },
                |_ctx| async { Ok(()) },
            ),
        )
        .await;

        assert_eq!(sup.err(), None);
    }

    #[tokio::test]
    async fn all_errors_returns_a_defensive_copy() {
        let sup = new_supervisor();
        sup.request_stop(Some(LifecycleError::fail("only")));

        let mut copy = sup.all_errors();
        copy.push(LifecycleError::Canceled);
        assert_eq!(sup.all_errors(), vec![LifecycleError::fail("only")]);
    }

    #[tokio::test]
    #[should_panic(expected = "name must not be empty")]
    async fn empty_component_name_is_a_programmer_error() {
        let sup = new_supervisor();
        sup.launch(
            "",
            ComponentSpec::run(|_ctx| async { Ok(()) }, |_ctx| async { Ok(()) }),
        )
        .await;
    }
}
