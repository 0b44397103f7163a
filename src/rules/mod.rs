//! Redirect rule bookkeeping.
//!
//! # Data Flow
//! ```text
//! RuleEngine::list(chain)  (raw iptables text, one chain at a time)
//!     → tag.rs (find SWITCHEROO tags of our namespace, parse numbers)
//!     → store.rs (concatenate chains, sort for deletion)
//!     → model.rs (Rule values, descending by rule number)
//! ```
//!
//! # Design Decisions
//! - Rule numbers are positions, not identities: deleting rule N shifts every
//!   rule above N in that chain down by one. Rules are always deleted in
//!   descending order from a single snapshot.
//! - Nothing is cached; every operation re-reads the control plane.
//! - Discovery is scoped to one namespace; other tags are invisible.

pub mod model;
pub mod store;
pub mod tag;

pub use model::{sort_for_deletion, Chain, ChainSet, PortRange, Rule};
pub use store::{DiscoveryError, RuleStore};
pub use tag::{ParseError, RuleTag};
