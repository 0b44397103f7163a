//! Handover error taxonomy.

use thiserror::Error;

use crate::config::ValidationError;
use crate::engine::EngineError;
use crate::net::AllocError;
use crate::rules::{Chain, DiscoveryError, Rule};

/// Errors that abort a handover operation.
///
/// Failures after the traffic cutover (stale rule deletion and signaling
/// during finalize) never appear here; they are logged and counted in the
/// [`FinalizeReport`](super::FinalizeReport).
#[derive(Debug, Error)]
pub enum HandoverError {
    /// Rejected at construction, before touching the control plane.
    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<ValidationError>),

    /// No rule engine could be set up (e.g. `iptables` missing).
    #[error("rule engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    /// The rule table could not be read or contained a malformed tag.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// No private port could be claimed.
    #[error(transparent)]
    Allocation(#[from] AllocError),

    /// Installing the new redirect rule failed.
    #[error("installing redirect rule in {chain} failed: {source}")]
    RuleInstall {
        chain: Chain,
        #[source]
        source: EngineError,
    },

    /// Standalone cleanup could not delete a rule.
    #[error("deleting rule {rule} failed: {source}")]
    CleanupDelete {
        rule: Rule,
        #[source]
        source: EngineError,
    },
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}
