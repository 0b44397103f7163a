//! Rule value types and the deletion ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A traffic-processing stage in the nat table.
///
/// Network and loopback traffic traverse different chains, so a rule in one
/// never affects traffic of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Traffic arriving from the network (`PREROUTING`).
    Network,
    /// Locally generated traffic, including loopback (`OUTPUT`).
    Loopback,
}

impl Chain {
    /// The iptables chain name.
    pub fn iptables_name(&self) -> &'static str {
        match self {
            Chain::Network => "PREROUTING",
            Chain::Loopback => "OUTPUT",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iptables_name())
    }
}

/// Which chains a handover installs rules into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSet {
    pub network: bool,
    pub loopback: bool,
}

impl ChainSet {
    /// Network and loopback.
    pub const ALL: ChainSet = ChainSet { network: true, loopback: true };

    /// Enabled chains, network first.
    pub fn iter(&self) -> impl Iterator<Item = Chain> {
        let network = self.network.then_some(Chain::Network);
        let loopback = self.loopback.then_some(Chain::Loopback);
        network.into_iter().chain(loopback)
    }

    pub fn is_empty(&self) -> bool {
        !self.network && !self.loopback
    }
}

impl Default for ChainSet {
    fn default() -> Self {
        Self { network: true, loopback: false }
    }
}

/// Inclusive range of private ports a handover may allocate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Number of ports in the range (0 when inverted).
    pub fn len(&self) -> u32 {
        if self.max < self.min {
            0
        } else {
            u32::from(self.max) - u32::from(self.min) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self { min: 40400, max: 40499 }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.min, self.max)
    }
}

/// A tagged redirect rule as observed in one discovery snapshot.
///
/// `rule_number` is only valid until the next mutation of `chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub chain: Chain,
    pub rule_number: u32,
    pub port: u16,
    pub pid: u32,
}

impl Rule {
    /// Deletion order: higher rule numbers first.
    pub fn deletion_order(a: &Rule, b: &Rule) -> Ordering {
        b.rule_number.cmp(&a.rule_number)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[chain={};num={};port={};pid={}]",
            self.chain, self.rule_number, self.port, self.pid
        )
    }
}

/// Sort rules so that deleting them front to back never invalidates the
/// number of a rule still waiting to be deleted.
pub fn sort_for_deletion(rules: &mut [Rule]) {
    rules.sort_by(Rule::deletion_order);
}

/// Comma-joined display of a rule list, for log fields.
pub struct RuleList<'a>(pub &'a [Rule]);

impl fmt::Display for RuleList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", rule)?;
        }
        Ok(())
    }
}
