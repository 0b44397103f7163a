//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Keep the namespace small enough for the 256 byte comment limit and
//!   free of characters that would break the tag grammar
//! - Validate port values and the private range
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure functions over plain values, shared by the file loader and the
//!   `Handover` builder

use std::fmt;

use crate::config::schema::HandoverConfig;
use crate::rules::tag::NAMESPACE_MAX_LEN;
use crate::rules::{ChainSet, PortRange};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyNamespace,
    NamespaceTooLong { len: usize },
    NamespaceInvalidChar { ch: char },
    IncomingPortZero,
    PortRangeInverted { min: u16, max: u16 },
    PortRangeIncludesZero,
    NoChainsEnabled,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyNamespace => write!(f, "namespace is empty"),
            ValidationError::NamespaceTooLong { len } => write!(
                f,
                "namespace is too long ({} bytes); the limit is {} bytes to stay within the 256 byte iptables comment limit",
                len, NAMESPACE_MAX_LEN
            ),
            ValidationError::NamespaceInvalidChar { ch } => {
                write!(f, "namespace contains {:?}, which is not allowed in rule tags", ch)
            }
            ValidationError::IncomingPortZero => write!(f, "incoming_port must be non-zero"),
            ValidationError::PortRangeInverted { min, max } => {
                write!(f, "port_range min {} is greater than max {}", min, max)
            }
            ValidationError::PortRangeIncludesZero => write!(f, "port_range must not include port 0"),
            ValidationError::NoChainsEnabled => write!(f, "at least one of chains.network / chains.loopback must be enabled"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a full configuration.
pub fn validate_config(config: &HandoverConfig) -> Result<(), Vec<ValidationError>> {
    validate_settings(&config.namespace, config.incoming_port, config.port_range, config.chains)
}

/// Validate the values a handover is built from.
pub fn validate_settings(
    namespace: &str,
    incoming_port: u16,
    port_range: PortRange,
    chains: ChainSet,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if namespace.is_empty() {
        errors.push(ValidationError::EmptyNamespace);
    }
    if namespace.len() > NAMESPACE_MAX_LEN {
        errors.push(ValidationError::NamespaceTooLong { len: namespace.len() });
    }
    if let Some(ch) = namespace.chars().find(|c| *c == ':' || *c == '*' || c.is_whitespace()) {
        errors.push(ValidationError::NamespaceInvalidChar { ch });
    }

    if incoming_port == 0 {
        errors.push(ValidationError::IncomingPortZero);
    }
    if port_range.min > port_range.max {
        errors.push(ValidationError::PortRangeInverted { min: port_range.min, max: port_range.max });
    } else if port_range.min == 0 {
        errors.push(ValidationError::PortRangeIncludesZero);
    }

    if chains.is_empty() {
        errors.push(ValidationError::NoChainsEnabled);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
