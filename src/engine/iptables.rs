//! `iptables` command executor.
//!
//! # Responsibilities
//! - Locate `iptables` (and optionally `sudo`) on PATH
//! - Build argument lists for list / insert / delete in the nat table
//! - Run them synchronously and turn non-zero exits into errors

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::config::EngineConfig;
use crate::engine::{EngineError, Redirect, RuleEngine};
use crate::rules::Chain;

/// Runs rule operations through the `iptables` binary.
#[derive(Debug, Clone)]
pub struct IptablesEngine {
    /// Program to spawn (`iptables` itself, or `sudo`).
    program: PathBuf,
    /// Arguments placed before the iptables arguments (the iptables path
    /// when running under sudo).
    prefix: Vec<String>,
}

impl IptablesEngine {
    /// Run `iptables` as-is; the process must have the privileges to
    /// modify the nat table.
    pub fn direct(iptables: &str) -> Result<Self, EngineError> {
        let program = locate_binary(iptables)?;
        Ok(Self { program, prefix: Vec::new() })
    }

    /// Run `iptables` through `sudo`.
    pub fn with_sudo(sudo: &str, iptables: &str) -> Result<Self, EngineError> {
        let program = locate_binary(sudo)?;
        let iptables = locate_binary(iptables)?;
        Ok(Self {
            program,
            prefix: vec![iptables.to_string_lossy().into_owned()],
        })
    }

    /// Build an engine from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        if config.use_sudo {
            Self::with_sudo(&config.sudo_path, &config.iptables_path)
        } else {
            Self::direct(&config.iptables_path)
        }
    }

    fn run(&self, args: &[String]) -> Result<Output, EngineError> {
        let program = self.program.display().to_string();
        tracing::trace!(program = %program, args = ?args, "Running rule engine command");

        let output = Command::new(&self.program)
            .args(&self.prefix)
            .args(args)
            .output()
            .map_err(|source| EngineError::Spawn { program: program.clone(), source })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(EngineError::Exit {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl RuleEngine for IptablesEngine {
    fn list(&self, chain: Chain) -> Result<String, EngineError> {
        let output = self.run(&list_args(chain))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn insert(&self, chain: Chain, redirect: &Redirect) -> Result<(), EngineError> {
        self.run(&insert_args(chain, redirect)).map(|_| ())
    }

    fn delete(&self, chain: Chain, rule_number: u32) -> Result<(), EngineError> {
        self.run(&delete_args(chain, rule_number)).map(|_| ())
    }
}

pub fn list_args(chain: Chain) -> Vec<String> {
    to_strings(&["-t", "nat", "-L", chain.iptables_name(), "-n", "--line-numbers"])
}

pub fn insert_args(chain: Chain, redirect: &Redirect) -> Vec<String> {
    let incoming = redirect.incoming_port.to_string();
    let target = redirect.target_port.to_string();
    let comment = redirect.tag.to_string();
    to_strings(&[
        "-t", "nat",
        "-I", chain.iptables_name(),
        "-p", "tcp",
        "--dport", &incoming,
        "-j", "REDIRECT", "--to-ports", &target,
        "-m", "comment", "--comment", &comment,
    ])
}

pub fn delete_args(chain: Chain, rule_number: u32) -> Vec<String> {
    to_strings(&["-t", "nat", "-D", chain.iptables_name(), &rule_number.to_string()])
}

fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Resolve `name` against PATH unless it already contains a path separator.
fn locate_binary(name: &str) -> Result<PathBuf, EngineError> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(EngineError::NotFound(name.to_string()))
        };
    }

    env::var_os("PATH")
        .and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(name))
                .find(|path| path.is_file())
        })
        .ok_or_else(|| EngineError::NotFound(name.to_string()))
}
