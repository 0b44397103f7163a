//! Sample HTTP service.
//!
//! # Data Flow
//! ```text
//! Handover::begin() listener
//!     → server.rs (Axum on the private port)
//!     → probe.rs (self-check over loopback)
//!     → Finalizer::finalize() routes the incoming port here
//! ```

pub mod probe;
pub mod server;

pub use probe::wait_until_serving;
pub use server::HttpServer;
