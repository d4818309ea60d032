// Connection module
// Accepts a single TCP connection, optionally wraps it in TLS, and serves it

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::Watcher;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::{AppState, PerformanceConfig};
use crate::handler::{self, ConnectionInfo};
use crate::logger;

/// Decrements the active connection counter when the connection task ends
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `watcher` - Graceful shutdown watcher for the serving loop
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    watcher: Watcher,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    let guard = ConnectionGuard(Arc::clone(conn_counter));

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.config.logging.access_log {
        logger::log_connection_accepted(&peer_addr);
    }

    let _ = stream.set_nodelay(true);

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let _guard = guard;
        match &state.tls_acceptor {
            Some(acceptor) => match with_timeout(
                acceptor.accept(stream),
                header_timeout(&state.config.performance),
            )
            .await
            {
                Ok(tls_stream) => {
                    let info = ConnectionInfo {
                        peer_addr: Some(peer_addr),
                        encrypted: true,
                    };
                    serve_connection(tls_stream, state, info, watcher).await;
                }
                Err(e) => logger::log_tls_handshake_failed(&peer_addr, &e),
            },
            None => {
                let info = ConnectionInfo {
                    peer_addr: Some(peer_addr),
                    encrypted: false,
                };
                serve_connection(stream, state, info, watcher).await;
            }
        }
    });
}

/// Time allowed for the TLS handshake and for each request head, `None` when disabled
fn header_timeout(performance: &PerformanceConfig) -> Option<Duration> {
    match performance.header_read_timeout {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Bound a handshake by `limit`; running out of time is a `TimedOut` error
async fn with_timeout<F, T>(handshake: F, limit: Option<Duration>) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, handshake)
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("handshake not completed within {}s", limit.as_secs()),
                ))
            }),
        None => handshake.await,
    }
}

/// Serve HTTP/1.1 on an established transport until the peer closes it,
/// keep-alive ends, or graceful shutdown completes.
async fn serve_connection<S>(stream: S, state: Arc<AppState>, info: ConnectionInfo, watcher: Watcher)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);

    let performance = &state.config.performance;
    let mut builder = http1::Builder::new();
    builder
        .keep_alive(performance.keep_alive)
        .timer(TokioTimer::new())
        .header_read_timeout(header_timeout(performance));

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), info)),
    );

    if let Err(err) = watcher.watch(conn).await {
        logger::log_connection_error(&err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn performance(header_read_timeout: u64) -> PerformanceConfig {
        PerformanceConfig {
            keep_alive: true,
            header_read_timeout,
            max_connections: None,
        }
    }

    #[test]
    fn test_header_timeout_zero_disables() {
        assert_eq!(header_timeout(&performance(0)), None);
        assert_eq!(
            header_timeout(&performance(30)),
            Some(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        let stalled = std::future::pending::<io::Result<()>>();
        let err = with_timeout(stalled, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_completed_handshake_passes_through() {
        let done = async { Ok::<_, io::Error>(7) };
        assert_eq!(with_timeout(done, Some(Duration::from_secs(5))).await.unwrap(), 7);
        assert_eq!(with_timeout(async { Ok::<_, io::Error>(8) }, None).await.unwrap(), 8);
    }
}
