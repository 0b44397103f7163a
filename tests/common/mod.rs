//! Shared fakes for handover integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::net::TcpListener;
use std::sync::Mutex;

use redirect_handover::engine::{EngineError, Redirect, RuleEngine};
use redirect_handover::lifecycle::{SignalError, SignalSink};
use redirect_handover::net::PortBinder;
use redirect_handover::rules::RuleTag;
use redirect_handover::Chain;

/// One row of the fake nat table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub incoming_port: u16,
    pub target_port: u16,
    pub comment: String,
}

/// Operations the engine was asked to perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List(Chain),
    Insert(Chain, u16),
    Delete(Chain, u32),
}

/// In-memory nat table that numbers rules the way iptables does: by
/// position, shifting down when a rule above is removed.
#[derive(Default)]
pub struct FakeRuleEngine {
    chains: Mutex<HashMap<Chain, Vec<Entry>>>,
    ops: Mutex<Vec<Op>>,
    /// Deleting a rule redirecting to one of these ports fails.
    fail_delete_ports: Mutex<BTreeSet<u16>>,
    /// Inserting into one of these chains fails.
    fail_insert_chains: Mutex<BTreeSet<Chain>>,
    fail_list: Mutex<bool>,
}

impl FakeRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tagged rule, as an older generation would have left it.
    pub fn seed(&self, chain: Chain, namespace: &str, port: u16, pid: u32) {
        self.seed_comment(chain, port, &RuleTag::new(namespace, port, pid).to_string());
    }

    /// Append a rule with an arbitrary comment.
    pub fn seed_comment(&self, chain: Chain, port: u16, comment: &str) {
        self.chains.lock().unwrap().entry(chain).or_default().push(Entry {
            incoming_port: 9999,
            target_port: port,
            comment: comment.to_string(),
        });
    }

    pub fn fail_delete_of_port(&self, port: u16) {
        self.fail_delete_ports.lock().unwrap().insert(port);
    }

    pub fn fail_insert_into(&self, chain: Chain) {
        self.fail_insert_chains.lock().unwrap().insert(chain);
    }

    pub fn fail_listing(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub fn entries(&self, chain: Chain) -> Vec<Entry> {
        self.chains.lock().unwrap().get(&chain).cloned().unwrap_or_default()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<Op> {
        self.ops().into_iter().filter(|op| matches!(op, Op::Delete(..))).collect()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

impl RuleEngine for FakeRuleEngine {
    fn list(&self, chain: Chain) -> Result<String, EngineError> {
        self.record(Op::List(chain));
        if *self.fail_list.lock().unwrap() {
            return Err(EngineError::Rejected("iptables: Permission denied".into()));
        }

        let chains = self.chains.lock().unwrap();
        let mut out = format!(
            "Chain {} (policy ACCEPT)\nnum  target     prot opt source               destination\n",
            chain.iptables_name()
        );
        for (i, entry) in chains.get(&chain).into_iter().flatten().enumerate() {
            out.push_str(&format!(
                "{}    REDIRECT   tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:{} /* {} */ redir ports {}\n",
                i + 1,
                entry.incoming_port,
                entry.comment,
                entry.target_port
            ));
        }
        Ok(out)
    }

    fn insert(&self, chain: Chain, redirect: &Redirect) -> Result<(), EngineError> {
        self.record(Op::Insert(chain, redirect.target_port));
        if self.fail_insert_chains.lock().unwrap().contains(&chain) {
            return Err(EngineError::Rejected(format!("insert into {} refused", chain)));
        }

        self.chains.lock().unwrap().entry(chain).or_default().insert(
            0,
            Entry {
                incoming_port: redirect.incoming_port,
                target_port: redirect.target_port,
                comment: redirect.tag.to_string(),
            },
        );
        Ok(())
    }

    fn delete(&self, chain: Chain, rule_number: u32) -> Result<(), EngineError> {
        self.record(Op::Delete(chain, rule_number));

        let mut chains = self.chains.lock().unwrap();
        let rules = chains.entry(chain).or_default();
        let idx = rule_number as usize;
        if idx == 0 || idx > rules.len() {
            return Err(EngineError::Rejected(format!("index of deletion too big: {}", rule_number)));
        }
        if self.fail_delete_ports.lock().unwrap().contains(&rules[idx - 1].target_port) {
            return Err(EngineError::Rejected(format!("delete of rule {} refused", rule_number)));
        }
        rules.remove(idx - 1);
        Ok(())
    }
}

/// Records pids it was asked to terminate.
#[derive(Default)]
pub struct RecordingSignals {
    pids: Mutex<Vec<u32>>,
    fail: Mutex<BTreeSet<u32>>,
}

impl RecordingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, pid: u32) {
        self.fail.lock().unwrap().insert(pid);
    }

    pub fn signaled(&self) -> Vec<u32> {
        self.pids.lock().unwrap().clone()
    }
}

impl SignalSink for RecordingSignals {
    fn terminate(&self, pid: u32) -> Result<(), SignalError> {
        self.pids.lock().unwrap().push(pid);
        if self.fail.lock().unwrap().contains(&pid) {
            return Err(SignalError::InvalidPid(pid));
        }
        Ok(())
    }
}

/// Binds ephemeral loopback ports no matter which port is requested.
#[derive(Default)]
pub struct EphemeralBinder {
    taken: Mutex<BTreeSet<u16>>,
    requested: Mutex<Vec<u16>>,
}

impl EphemeralBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make binds of `port` fail with `AddrInUse`.
    pub fn occupy(&self, port: u16) {
        self.taken.lock().unwrap().insert(port);
    }

    pub fn requested(&self) -> Vec<u16> {
        self.requested.lock().unwrap().clone()
    }
}

impl PortBinder for EphemeralBinder {
    fn bind(&self, port: u16) -> io::Result<TcpListener> {
        self.requested.lock().unwrap().push(port);
        if self.taken.lock().unwrap().contains(&port) {
            return Err(io::Error::from(io::ErrorKind::AddrInUse));
        }
        TcpListener::bind("127.0.0.1:0")
    }
}
