//! OS signal handling.
//!
//! # Responsibilities
//! - Deliver SIGTERM to superseded process generations
//! - Wait for SIGTERM/SIGINT in the current process
//!
//! # Design Decisions
//! - SIGTERM only, never SIGKILL: the old generation drains its in-flight
//!   requests before exiting
//! - Delivery is fire-and-forget per pid

use std::io;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;

/// Errors raised while signaling a process.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The pid would address a process group rather than a process.
    #[error("refusing to signal pid {0}")]
    InvalidPid(u32),

    #[error("kill -TERM {pid}: {source}")]
    Delivery {
        pid: u32,
        #[source]
        source: Errno,
    },
}

/// Asks processes to shut down gracefully.
pub trait SignalSink: Send + Sync {
    fn terminate(&self, pid: u32) -> Result<(), SignalError>;
}

/// Sends SIGTERM.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigtermSink;

impl SignalSink for SigtermSink {
    fn terminate(&self, pid: u32) -> Result<(), SignalError> {
        // 0 and negative values address process groups
        let raw = i32::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .ok_or(SignalError::InvalidPid(pid))?;

        kill(Pid::from_raw(raw), Signal::SIGTERM)
            .map_err(|source| SignalError::Delivery { pid, source })
    }
}

/// Listens for SIGTERM and SIGINT in the current process.
///
/// Handlers are installed by [`register`](Self::register), not on first
/// poll: a generation must register before its rules go live, or a SIGTERM
/// from its successor would hit the default action and kill it mid-request.
#[derive(Debug)]
pub struct Termination {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl Termination {
    /// Install the handlers. Must be called inside a Tokio runtime.
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Resolve once SIGTERM or SIGINT arrives.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!("Interrupt received"),
            _ = self.terminate.recv() => tracing::info!("SIGTERM received"),
        }

        #[cfg(not(unix))]
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    }
}
