//! Sample service restarting through a redirect handover.
//!
//! # Lifecycle
//!
//! ```text
//!   load config ─▶ register signals ─▶ begin() ─▶ serve on private port
//!                                                          │
//!   exit ◀─ drain ◀─ SIGTERM ◀─ serve ◀─ finalize() ◀─ self-check
//!                       ▲
//!                       └── sent by the next generation's finalize()
//! ```
//!
//! Usage: `redirect-handover [config.toml]`. Without a file the defaults
//! apply (namespace `default`, incoming port 9999, network chain only).

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use redirect_handover::config::{load_config, HandoverConfig};
use redirect_handover::http::{wait_until_serving, HttpServer};
use redirect_handover::lifecycle::{Shutdown, Termination};
use redirect_handover::observability::init_logging;
use redirect_handover::Handover;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => HandoverConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!(
        namespace = %config.namespace,
        incoming_port = config.incoming_port,
        port_range = %config.port_range,
        "redirect-handover starting"
    );

    // Before begin(): the next generation may signal us as soon as our rule
    // is live.
    let mut termination = Termination::register()?;

    let handover = Handover::from_config(&config)?;
    let (std_listener, finalizer) = handover.begin()?;
    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(&config.server);
    let requests = server.request_counter();
    let shutdown = Shutdown::new();
    let serving = tokio::spawn(server.run(listener, shutdown.signaled()));

    let ready = wait_until_serving(
        addr,
        config.server.readiness_attempts,
        Duration::from_millis(config.server.readiness_interval_ms),
    )
    .await;
    if !ready {
        tracing::warn!(address = %addr, "Self-check never succeeded; finalizing anyway");
    }

    let report = tokio::task::spawn_blocking(move || finalizer.finalize()).await??;
    tracing::info!(
        port = report.port,
        rules_deleted = report.rules_deleted,
        processes_signaled = report.processes_signaled,
        "Now receiving traffic"
    );

    termination.recv().await;
    tracing::info!("Stopping HTTP server gracefully");
    let started = Instant::now();
    shutdown.trigger();

    let drain = Duration::from_secs(config.server.drain_timeout_secs);
    match tokio::time::timeout(drain, serving).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(timeout = ?drain, "Drain deadline exceeded"),
    }

    tracing::info!(
        elapsed = ?started.elapsed(),
        served = requests.load(Ordering::Relaxed),
        "Server exits"
    );
    Ok(())
}
