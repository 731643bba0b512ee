//! Termination signal handling for `cofferd`.

use tokio::signal;

/// Resolve when the process is asked to stop.
///
/// Listens for Ctrl-C and, on Unix, SIGTERM (what container runtimes and
/// service managers send). The caller runs the flush + final snapshot
/// sequence after this returns; if the handlers cannot be installed the
/// process has no graceful path to durability and must not keep serving.
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c().await.expect("ctrl-c handler installation failed");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!(signal = "interrupt", "stopping"),
        _ = terminate => tracing::info!(signal = "terminate", "stopping"),
    }
}
