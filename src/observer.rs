use async_trait::async_trait;

use crate::event::{Event, EventKind};

/// Hook into supervisor lifecycle events (logging, metrics, custom sinks).
///
/// The supervisor delivers every published [`Event`] to exactly one observer,
/// from a dedicated listener task.
#[async_trait]
pub trait Observer {
    /// Called once per published event, in publish order.
    async fn on_event(&self, event: &Event);
}

/// Built-in observer that prints one line per event (demo/reference only).
pub struct LoggerObserver;

#[async_trait]
impl Observer for LoggerObserver {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::LaunchDiscarded => {
                println!("[launch-discarded] component={:?}", e.component);
            }
            EventKind::ComponentStarting => {
                println!("[starting] component={:?}", e.component);
            }
            EventKind::ComponentReady => {
                println!("[ready] component={:?}", e.component);
            }
            EventKind::ComponentExited => {
                println!("[exited] component={:?} err={:?}", e.component, e.error);
            }
            EventKind::ComponentFailed => {
                println!(
                    "[failed] component={:?} stage={:?} err={:?}",
                    e.component, e.stage, e.error
                );
            }
            EventKind::ComponentShutdown => {
                println!("[shutdown] component={:?}", e.component);
            }
            EventKind::BackoffScheduled => {
                println!(
                    "[backoff] component={:?} delay={:?} attempt={:?}",
                    e.component, e.delay, e.attempt
                );
            }
            EventKind::AllStopped => {
                println!("[all-stopped]");
            }
        }
    }
}
