// Signal handling module (nginx-style)
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGUSR1: Reopen log files

use tokio_util::sync::CancellationToken;

use crate::logger;

/// Start signal handlers (Unix only)
///
/// Registers the handlers up front so a failure surfaces at startup, then
/// spawns a background task that cancels `shutdown` on the first stop signal.
///
/// # Signals
///
/// | Signal  | Action          | Nginx Equivalent  |
/// |---------|-----------------|-------------------|
/// | SIGTERM | Graceful stop   | `nginx -s quit`   |
/// | SIGINT  | Graceful stop   | Ctrl+C            |
/// | SIGUSR1 | Reopen logs     | `nginx -s reopen` |
#[cfg(unix)]
pub fn start_signal_handler(shutdown: CancellationToken) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    logger::log_info(&format!(
        "[SIGNAL] Handlers registered (TERM/INT stop, USR1 reopens logs), pid {}",
        std::process::id()
    ));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    logger::log_info("[SIGNAL] SIGTERM received, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    logger::log_info("[SIGNAL] SIGINT received, shutting down gracefully");
                    break;
                }
                _ = sigusr1.recv() => {
                    logger::log_info("[SIGNAL] SIGUSR1 received, reopening log files");
                    logger::reopen();
                }
            }
        }
        shutdown.cancel();
    });

    Ok(())
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: CancellationToken) -> std::io::Result<()> {
    tokio::spawn(async move {
        logger::log_info("[SIGNAL] Windows mode: Only Ctrl+C is supported");

        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("[SIGNAL] Ctrl+C received, shutting down gracefully");
            shutdown.cancel();
        }
    });

    Ok(())
}
