//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Superseded generation (signals.rs):
//!     Finalize → SignalSink::terminate(pid) → SIGTERM
//!
//! Serving generation (signals.rs + shutdown.rs):
//!     Termination::register() (before Begin)
//!     SIGTERM/SIGINT → Termination::recv() → Shutdown::trigger()
//!     → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - Graceful only: the new rule already routes new connections elsewhere,
//!   so the old generation just needs to finish what it has
//! - Draining has a deadline, enforced by the caller

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{SignalError, SignalSink, SigtermSink, Termination};
