//! Cross-platform OS signal handling utilities.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal. A typical application races it against
//! [`Supervisor::wait`](crate::Supervisor::wait) and converts it into a
//! [`request_stop`](crate::Supervisor::request_stop).
//!
//! ## Unix
//! Handled signals:
//! - **SIGINT** (Ctrl-C in terminal)
//! - **SIGTERM** (default kill signal, used by systemd/Kubernetes)
//! - **SIGQUIT** (optional "quit" signal, often used for hard stop)
//!
//! Additionally, [`tokio::signal::ctrl_c`] is awaited as a fallback.
//!
//! ## Windows
//! On non-Unix platforms only [`tokio::signal::ctrl_c`] is awaited.

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
