// Connection handling module
// Serves one accepted TCP connection and keeps count of live connections

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Live connection count, with a wake-up when it drops to zero
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Reserve a slot, failing if `limit` connections are already open
    fn try_acquire(&self, limit: Option<u64>) -> bool {
        // Increment first, then check (prevents race condition)
        let prev = self.active.fetch_add(1, Ordering::SeqCst);
        let max = limit.map_or(usize::MAX, |m| usize::try_from(m).unwrap_or(usize::MAX));
        if prev >= max {
            self.release();
            return false;
        }
        true
    }

    fn release(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Resolve once no connection is open
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Accept a connection, enforcing `performance.max_connections`.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `tracker` - Live connection counter
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    tracker: &Arc<ConnectionTracker>,
) {
    let limit = state.config.performance.max_connections;
    if !tracker.try_acquire(limit) {
        logger::log_connection_rejected(&peer_addr, limit.unwrap_or_default());
        drop(stream);
        return;
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state), Arc::clone(tracker));
}

/// Serve a single connection in a spawned task.
///
/// On shutdown the connection finishes its in-flight request, then closes.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    tracker: Arc<ConnectionTracker>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let perf = &state.config.performance;

        let mut builder = http1::Builder::new();
        builder
            .keep_alive(perf.keep_alive)
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(perf.header_read_timeout));

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                handler::handle_request(req, Arc::clone(&service_state), peer_addr)
            }),
        );
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            () = state.shutdown.cancelled() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };
        if let Err(err) = result {
            logger::log_connection_error(&err);
        }

        tracker.release();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_limit() {
        let tracker = ConnectionTracker::default();
        assert!(tracker.try_acquire(Some(2)));
        assert!(tracker.try_acquire(Some(2)));
        assert!(!tracker.try_acquire(Some(2)));
        assert_eq!(tracker.active(), 2);

        tracker.release();
        assert!(tracker.try_acquire(Some(2)));
        assert!(tracker.try_acquire(None));
        assert_eq!(tracker.active(), 3);
    }

    #[tokio::test]
    async fn test_wait_idle() {
        let tracker = Arc::new(ConnectionTracker::default());
        tracker.wait_idle().await;

        assert!(tracker.try_acquire(None));
        let releaser = Arc::clone(&tracker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            releaser.release();
        });

        tokio::time::timeout(Duration::from_secs(2), tracker.wait_idle())
            .await
            .unwrap();
        assert_eq!(tracker.active(), 0);
    }
}
