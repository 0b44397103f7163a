//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! begin / finalize / cleanup
//!     → logging.rs stage span (namespace, pid, stage)
//!     → tracing events inside the span
//!     → whatever subscriber the binary installed (fmt to stdout here)
//! ```

pub mod logging;

pub use logging::{init_logging, stage_span, Stage};
