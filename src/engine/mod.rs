//! Packet-filter control plane.
//!
//! # Data Flow
//! ```text
//! RuleStore / Handover
//!     → RuleEngine trait (list / insert / delete, one chain at a time)
//!     → iptables.rs (spawn `iptables` or `sudo iptables`, capture output)
//!     → kernel nat table
//! ```
//!
//! # Design Decisions
//! - The engine is an injected capability, so the coordinator can be driven
//!   by an in-memory table in tests.
//! - Every call is synchronous and returns a definitive success or failure.
//! - No timeouts: a hanging `iptables` hangs the caller.

pub mod iptables;

use thiserror::Error;

use crate::rules::{Chain, RuleTag};

pub use iptables::IptablesEngine;

/// Errors raised while talking to the control plane.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required binary could not be found on PATH.
    #[error("failed to locate {0} binary")]
    NotFound(String),

    /// The command could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    /// The engine refused the operation without running anything.
    ///
    /// `IptablesEngine` never produces this; it is for engines that wrap or
    /// stand in for the command line (policy wrappers, in-memory tables).
    #[error("rule engine rejected the operation: {0}")]
    Rejected(String),
}

/// A redirect rule to install: tcp traffic for `incoming_port` goes to
/// `target_port`, tagged so discovery can find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub incoming_port: u16,
    pub target_port: u16,
    pub tag: RuleTag,
}

/// Executes nat table operations.
pub trait RuleEngine: Send + Sync {
    /// Raw listing of `chain`, with line numbers.
    fn list(&self, chain: Chain) -> Result<String, EngineError>;

    /// Insert `redirect` at the head of `chain`, ahead of every other rule.
    fn insert(&self, chain: Chain, redirect: &Redirect) -> Result<(), EngineError>;

    /// Delete the rule currently numbered `rule_number` in `chain`.
    fn delete(&self, chain: Chain, rule_number: u32) -> Result<(), EngineError>;
}
