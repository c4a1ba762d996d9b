use std::time::Duration;

/// Probe provider reachability. Non-fatal by design: callers warn and
/// continue when this returns false.
pub async fn network_live(host: &str, port: u16, timeout: Duration) -> bool {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::warn!(%addr, "network probe failed: {e}");
            false
        }
        Err(_) => {
            tracing::warn!(%addr, "network probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_port_is_false() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let live = network_live("192.0.2.1", 9, Duration::from_millis(50)).await;
        assert!(!live);
    }

    #[tokio::test]
    async fn local_listener_is_true() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let live = network_live("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(live);
    }
}
