// Signal handling module
//
// SIGTERM and SIGINT stop the accept loop; in-flight requests finish on
// their own connections.

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Wait for a termination signal in the background and notify `shutdown`
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    logger::log_error(&format!("Failed to register signal handlers: {e}"));
                    return;
                }
            };

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        logger::write_info(&format!("\n[SIGNAL] {name} received, shutting down..."));
        shutdown.notify_one();
    });
}

/// Non-unix fallback, only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logger::write_info("\n[SIGNAL] Ctrl+C received, shutting down...");
                shutdown.notify_one();
            }
            Err(e) => logger::log_error(&format!("Failed to listen for Ctrl+C: {e}")),
        }
    });
}
