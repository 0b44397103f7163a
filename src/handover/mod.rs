//! Handover coordination subsystem.
//!
//! # Data Flow
//! ```text
//! Handover::begin()                                   [Idle → Bound]
//!     → RuleStore::discover() (ports in use)
//!     → PortAllocator::allocate() (bind private port)
//!     → (TcpListener, Finalizer)
//!
//! caller serves on the listener, then:
//!
//! Finalizer::finalize()                    [Bound → Finalizing → Done]
//!     → RuleEngine::insert() per chain      (cutover, fatal on error)
//!     → RuleEngine::discover() again        (fresh snapshot)
//!     → RuleEngine::delete() stale rules    (best effort, descending)
//!     → SignalSink::terminate() old pids    (best effort, deduplicated)
//!
//! Handover::cleanup()                                   (stateless)
//!     → discover → delete all, fail-fast
//! ```
//!
//! # Concurrency
//! All three operations are blocking and meant to run once per process
//! generation. No lock is taken across processes: two generations
//! finalizing the same namespace at the same time is not safe and must be
//! avoided operationally. Port claims are protected by the kernel refusing
//! a second bind; rule mutations rely on iptables applying each insert or
//! delete atomically.
//!
//! # Design Decisions
//! - A failed multi-chain install is not rolled back; the chains already
//!   mutated keep their new rule and the error names the failing chain
//! - The caller's own pid is never signaled

pub mod coordinator;
pub mod error;

pub use coordinator::{FinalizeReport, Finalizer, Handover, HandoverBuilder};
pub use error::HandoverError;
