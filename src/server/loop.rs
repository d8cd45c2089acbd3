// Server loop module
// Accepts connections until shutdown, then drains them within the grace period

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::{accept_connection, ConnectionTracker};
use crate::config::AppState;
use crate::logger;

/// How long aborted requests get to write their 500 before the process exits
const ABORT_FLUSH: Duration = Duration::from_secs(5);

/// Run the accept loop until `state.shutdown` is cancelled.
///
/// Shutdown stops accepting, lets open connections finish for
/// `performance.shutdown_grace_secs`, then cancels `state.abort` so in-flight
/// model calls stop.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>) {
    let tracker = Arc::new(ConnectionTracker::default());

    loop {
        tokio::select! {
            biased;

            () = state.shutdown.cancelled() => break,

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &tracker);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
        }
    }
    drop(listener);

    drain(&state, &tracker).await;
}

async fn drain(state: &AppState, tracker: &ConnectionTracker) {
    let grace = Duration::from_secs(state.config.performance.shutdown_grace_secs);
    logger::log_shutdown_started(tracker.active(), grace);

    if tokio::time::timeout(grace, tracker.wait_idle()).await.is_err() {
        logger::log_shutdown_forced(tracker.active());
        state.abort.cancel();
        if tokio::time::timeout(ABORT_FLUSH, tracker.wait_idle())
            .await
            .is_err()
        {
            logger::log_warning(&format!(
                "[Shutdown] {} connection(s) still open, exiting anyway",
                tracker.active()
            ));
        }
    }

    logger::log_shutdown_complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::fake::FakeModel;
    use crate::server::listener::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn state(tmp: &std::path::Path, model: FakeModel, grace: u64) -> Arc<AppState> {
        let mut config = Config::load_from("this-config-file-does-not-exist").unwrap();
        config.logging.access_log = false;
        config.performance.shutdown_grace_secs = grace;
        config.storage.output_dir = tmp.join("videos").to_string_lossy().to_string();
        config.storage.staging_dir = tmp.join("tmp").to_string_lossy().to_string();
        Arc::new(AppState::with_model(&config, Arc::new(model)).await.unwrap())
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(tmp.path(), FakeModel::succeeding(b"x"), 1).await;
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let response = get(addr, "/healthz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("server: dotted-relay/0.1"));
        assert!(response.ends_with("ok"));

        state.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(!state.abort.is_cancelled());
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_grace_expiry_aborts_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(tmp.path(), FakeModel::hanging(), 0).await;
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let body = concat!(
            "--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"clip.mp4\"\r\n",
            "\r\nraw\r\n--b--\r\n"
        );
        let request = format!(
            "POST /generate-video HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
             Content-Type: multipart/form-data; boundary=b\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        // let the request reach the model before shutting down
        tokio::time::sleep(Duration::from_millis(100)).await;
        state.shutdown.cancel();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.contains("cancelled"));

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(state.abort.is_cancelled());
        assert_eq!(std::fs::read_dir(tmp.path().join("tmp")).unwrap().count(), 0);
    }
}
