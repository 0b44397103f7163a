//! Zero-downtime restarts through iptables redirect handover.
//!
//! A new process generation binds a private port, starts serving, and then
//! takes over the public port by inserting a redirect rule ahead of the old
//! generation's rule. The old rules are removed and their owners receive
//! SIGTERM. Rules carry a namespace tag so several services can share a host.
//!
//! ```no_run
//! use redirect_handover::Handover;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handover = Handover::builder("web", 9999).build()?;
//! let (listener, finalizer) = handover.begin()?;
//! // start serving on `listener`, then:
//! finalizer.finalize()?;
//! # drop(listener);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod handover;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rules;

pub use config::HandoverConfig;
pub use handover::{FinalizeReport, Finalizer, Handover, HandoverError};
pub use rules::{Chain, ChainSet, PortRange, Rule};
