//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section has defaults so a minimal file only names the namespace and
//! the incoming port.

use serde::{Deserialize, Serialize};

use crate::rules::{ChainSet, PortRange};

/// Root configuration for a handover-managed service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandoverConfig {
    /// Tags this service's rules; services sharing a host need distinct
    /// namespaces.
    pub namespace: String,

    /// Public port clients connect to.
    pub incoming_port: u16,

    /// Private ports each generation may bind.
    pub port_range: PortRange,

    /// Chains to install redirect rules into.
    pub chains: ChainSet,

    /// How `iptables` is invoked.
    pub engine: EngineConfig,

    /// Sample server settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            incoming_port: 9999,
            port_range: PortRange::default(),
            chains: ChainSet::default(),
            engine: EngineConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Rule engine invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `iptables` binary, resolved through PATH unless it contains a `/`.
    pub iptables_path: String,

    /// Run `iptables` through `sudo`.
    pub use_sudo: bool,

    /// `sudo` binary.
    pub sudo_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iptables_path: "iptables".to_string(),
            use_sudo: false,
            sudo_path: "sudo".to_string(),
        }
    }
}

/// Sample HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long in-flight requests may drain after SIGTERM, in seconds.
    pub drain_timeout_secs: u64,

    /// Self-check attempts before finalizing.
    pub readiness_attempts: u32,

    /// Delay between self-check attempts in milliseconds.
    pub readiness_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            drain_timeout_secs: 60,
            readiness_attempts: 50,
            readiness_interval_ms: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
