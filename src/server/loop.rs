// Server loop module
// Accepts connections until shutdown, then drains in-flight transfers

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections get to finish after shutdown is requested
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Run the accept loop until `shutdown` is notified.
///
/// Accept errors are logged and the loop keeps going. Once shutdown is
/// requested the listener is dropped and open connections are given
/// `grace_period` to complete.
#[allow(clippy::ignored_unit_patterns)]
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
    grace_period: Duration,
) {
    let graceful = GracefulShutdown::new();
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            graceful.watcher(),
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown_requested();
                break;
            }
        }
    }

    drop(listener);

    let drained = tokio::select! {
        _ = graceful.shutdown() => true,
        _ = tokio::time::sleep(grace_period) => false,
    };
    logger::log_shutdown_complete(drained);
}
