//! Rule discovery against the live nat table.

use thiserror::Error;

use crate::engine::{EngineError, RuleEngine};
use crate::rules::model::{sort_for_deletion, Chain, ChainSet, Rule};
use crate::rules::tag::{ParseError, TagMatcher};

/// Errors raised while reading the current rule set.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("listing chain {chain} failed: {source}")]
    List {
        chain: Chain,
        #[source]
        source: EngineError,
    },

    #[error("malformed rule in chain {chain}: {source}")]
    Parse {
        chain: Chain,
        #[source]
        source: ParseError,
    },
}

/// Read-only view of one namespace's rules.
pub struct RuleStore<'a> {
    engine: &'a dyn RuleEngine,
    chains: ChainSet,
    matcher: TagMatcher,
}

impl<'a> RuleStore<'a> {
    pub fn new(engine: &'a dyn RuleEngine, namespace: &str, chains: ChainSet) -> Self {
        Self {
            engine,
            chains,
            matcher: TagMatcher::new(namespace),
        }
    }

    /// Snapshot every rule of the namespace across enabled chains.
    ///
    /// The result is sorted for deletion (descending rule number), and that
    /// order is the contract for anyone deleting these rules.
    pub fn discover(&self) -> Result<Vec<Rule>, DiscoveryError> {
        let mut rules = Vec::new();

        for chain in self.chains.iter() {
            let listing = self
                .engine
                .list(chain)
                .map_err(|source| DiscoveryError::List { chain, source })?;

            for line in listing.lines() {
                let parsed = self
                    .matcher
                    .parse_line(line)
                    .map_err(|source| DiscoveryError::Parse { chain, source })?;

                if let Some(tagged) = parsed {
                    rules.push(Rule {
                        chain,
                        rule_number: tagged.rule_number,
                        port: tagged.port,
                        pid: tagged.pid,
                    });
                }
            }
        }

        sort_for_deletion(&mut rules);
        tracing::trace!(count = rules.len(), "Rules discovered");
        Ok(rules)
    }
}
