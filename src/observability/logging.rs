//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries
//! - Provide the per-stage span every handover operation logs under
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is the
//!   binary's call, so an embedding service without one gets no output
//! - RUST_LOG overrides the configured level

use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Stage of a handover, as it appears in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Finalize,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Finalize => "finalize",
            Stage::Cleanup => "cleanup",
        }
    }
}

/// Span carrying namespace, pid and stage for everything logged inside it.
pub fn stage_span(namespace: &str, stage: Stage) -> Span {
    tracing::info_span!(
        "handover",
        namespace = %namespace,
        pid = std::process::id(),
        stage = stage.as_str()
    )
}

/// Install a fmt subscriber filtered by RUST_LOG, falling back to `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}
