//! # The control loop: the single task driving Alive → Dying → Dead.
//!
//! **Alive** — select over the stop signal and the launch queue. Each
//! accepted request is appended to the owned component list *before* its
//! start attempt, so a partially brought-up component is still visible to
//! the shutdown sweep. Start and readiness failures are recorded and convert
//! into a stop request; the requester's ack fires on every path.
//!
//! **Dying** — close the queue and ack the stragglers, then shut components
//! down sequentially in reverse launch order. Failures are recorded but do
//! not halt the sweep. A short reporting grace lets in-flight exit monitors
//! publish their final errors before the done signal releases `wait()`.
//!
//! The loop owns the component list outright; nothing else appends to or
//! iterates it, which is what makes the sweep safe without holding the state
//! lock across user calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use crate::component::Component;
use crate::error::Stage;
use crate::event::{Event, EventKind};

use super::{LaunchRequest, Lifecycle, Shared};

/// Delay between finishing the dying sweep and firing the done signal.
///
/// Not a timeout: a deterministic beat that lets already-scheduled exit
/// monitors flush their notifications, so `wait()` observes true outcomes
/// instead of racing late reports.
const EXIT_REPORTING_GRACE: Duration = Duration::from_millis(100);

pub(crate) async fn run(shared: Arc<Shared>, mut rx: mpsc::Receiver<LaunchRequest>) {
    let mut components = alive(&shared, &mut rx).await;

    shared.set_lifecycle(Lifecycle::Alive, Lifecycle::Dying);
    dying(&shared, rx, &mut components).await;

    shared.set_lifecycle(Lifecycle::Dying, Lifecycle::Dead);
    shared.done.cancel();
}

async fn alive(shared: &Arc<Shared>, rx: &mut mpsc::Receiver<LaunchRequest>) -> Vec<Component> {
    let mut components = Vec::new();
    loop {
        tokio::select! {
            _ = shared.stop.cancelled() => break,
            req = rx.recv() => match req {
                Some(req) => do_launch(shared, &mut components, req).await,
                None => break,
            },
        }
    }
    components
}

async fn do_launch(shared: &Arc<Shared>, components: &mut Vec<Component>, req: LaunchRequest) {
    let LaunchRequest {
        name,
        component,
        ack,
    } = req;

    // The select over {stop, queue} is unbiased; re-check before committing.
    if shared.stop.is_cancelled() {
        shared
            .bus
            .publish(Event::now(EventKind::LaunchDiscarded).with_component(&name));
        let _ = ack.send(());
        return;
    }

    shared
        .bus
        .publish(Event::now(EventKind::ComponentStarting).with_component(&name));

    let idx = components.len();
    components.push(component);
    let component = &mut components[idx];

    match component.start(&shared.ctx) {
        Err(err) => {
            shared.record_error(&name, Stage::Startup, err);
            shared.request_stop(None);
        }
        Ok(()) => match component.wait_ready(&shared.ctx, &shared.stop).await {
            Err(err) => {
                shared.record_error(&name, Stage::WaitReady, err);
                shared.request_stop(None);
            }
            Ok(()) => {
                shared
                    .bus
                    .publish(Event::now(EventKind::ComponentReady).with_component(&name));
            }
        },
    }

    let _ = ack.send(());
}

async fn dying(
    shared: &Arc<Shared>,
    mut rx: mpsc::Receiver<LaunchRequest>,
    components: &mut [Component],
) {
    // Outstanding launch requests are summarily discarded, but their callers
    // must still be released.
    rx.close();
    while let Some(req) = rx.recv().await {
        shared
            .bus
            .publish(Event::now(EventKind::LaunchDiscarded).with_component(&req.name));
        let _ = req.ack.send(());
    }

    for component in components.iter_mut().rev() {
        let name = component.name().to_string();
        match component.shutdown(&shared.ctx).await {
            Ok(()) => {
                shared
                    .bus
                    .publish(Event::now(EventKind::ComponentShutdown).with_component(&name));
            }
            Err(err) => {
                shared.record_error(&name, Stage::Shutdown, err);
            }
        }
    }

    shared.bus.publish(Event::now(EventKind::AllStopped));
    time::sleep(EXIT_REPORTING_GRACE).await;
}
