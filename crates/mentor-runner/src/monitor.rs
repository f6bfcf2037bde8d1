//! Monitor (TensorBoard) detection.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Timeout for the "is something already listening" check.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// URL a monitor listening on `port` is reachable at.
pub fn monitor_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Returns true if a TCP connect to `127.0.0.1:<port>` succeeds quickly.
pub async fn is_port_listening(port: u16) -> bool {
    match timeout(CONNECT_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(port, error = %e, "Nothing listening on monitor port");
            false
        }
        Err(_) => {
            debug!(port, "Monitor port check timed out");
            false
        }
    }
}
