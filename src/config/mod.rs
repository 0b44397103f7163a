//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HandoverConfig (validated, immutable)
//!     → Handover::from_config (engine, signal sink, binder wired in)
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the lifetime of a handover
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{EngineConfig, HandoverConfig, ObservabilityConfig, ServerConfig};
pub use validation::ValidationError;
