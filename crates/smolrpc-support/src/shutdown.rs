use tokio::signal::unix::{signal, SignalKind};

/// Waits for `SIGINT`, `SIGHUP`, or `SIGTERM`. Any one of the three is a
/// clean-shutdown request: the caller is expected to stop its listeners,
/// close connections, unlink socket paths it owns, and exit the event loop
/// with code 0.
pub async fn wait_for_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = sighup.recv() => tracing::info!("received SIGHUP, shutting down"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
    }
}
