//! Readiness self-check.
//!
//! A new generation must answer requests before it finalizes: once the
//! redirect rule is installed, every new connection lands on it.

use std::net::SocketAddr;
use std::time::Duration;

/// Poll `GET http://127.0.0.1:<port>/` until it answers 200.
///
/// Returns false when every attempt failed.
pub async fn wait_until_serving(addr: SocketAddr, attempts: u32, interval: Duration) -> bool {
    let client = match reqwest::Client::builder().no_proxy().build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build readiness client");
            return false;
        }
    };
    let url = format!("http://127.0.0.1:{}/", addr.port());

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => {
                tracing::debug!(attempt, "Readiness check passed");
                return true;
            }
            Ok(res) => tracing::debug!(attempt, status = %res.status(), "Not ready yet"),
            Err(e) => tracing::debug!(attempt, error = %e, "Not ready yet"),
        }
    }
    false
}
