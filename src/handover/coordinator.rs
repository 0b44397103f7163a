//! Begin / Finalize / Cleanup.
//!
//! # Responsibilities
//! - Begin: read the namespace's rules, claim a private port
//! - Finalize: cut traffic over, then clean up the old generation
//! - Cleanup: remove every rule of the namespace
//!
//! # Design Decisions
//! - The Bound state is the `Finalizer` value; finalizing consumes it, so a
//!   handover cannot be finalized twice
//! - Errors before the cutover abort and surface; errors after it are logged
//!   and counted, since traffic already reaches the new generation
//! - Cleanup is fail-fast: removing rules is its whole purpose

use std::collections::BTreeSet;
use std::fmt;
use std::net::TcpListener;
use std::sync::Arc;

use crate::config::validation::validate_settings;
use crate::config::HandoverConfig;
use crate::engine::{IptablesEngine, Redirect, RuleEngine};
use crate::handover::HandoverError;
use crate::lifecycle::{SignalSink, SigtermSink};
use crate::net::{PortAllocator, PortBinder, TcpBinder};
use crate::observability::{stage_span, Stage};
use crate::rules::model::RuleList;
use crate::rules::{Chain, ChainSet, PortRange, Rule, RuleStore, RuleTag};

/// Everything a handover needs, fixed at construction.
struct Settings {
    namespace: String,
    incoming_port: u16,
    port_range: PortRange,
    chains: ChainSet,
    engine: Arc<dyn RuleEngine>,
    signals: Arc<dyn SignalSink>,
    binder: Arc<dyn PortBinder>,
}

impl Settings {
    fn store(&self) -> RuleStore<'_> {
        RuleStore::new(self.engine.as_ref(), &self.namespace, self.chains)
    }

    fn chain_names(&self) -> String {
        self.chains.iter().map(|c| c.iptables_name()).collect::<Vec<_>>().join("+")
    }
}

// Capabilities are trait objects; only the plain settings are shown.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("namespace", &self.namespace)
            .field("incoming_port", &self.incoming_port)
            .field("port_range", &self.port_range)
            .field("chains", &self.chains)
            .finish_non_exhaustive()
    }
}

/// Coordinates traffic handover between process generations of one service.
#[derive(Debug, Clone)]
pub struct Handover {
    settings: Arc<Settings>,
}

impl Handover {
    /// Start building a handover for `namespace`, receiving traffic on
    /// `incoming_port`.
    pub fn builder(namespace: impl Into<String>, incoming_port: u16) -> HandoverBuilder {
        HandoverBuilder {
            namespace: namespace.into(),
            incoming_port,
            port_range: PortRange::default(),
            chains: ChainSet::default(),
            engine: None,
            signals: None,
            binder: None,
        }
    }

    /// Production wiring: `iptables` (optionally via sudo), SIGTERM, real
    /// sockets.
    pub fn from_config(config: &HandoverConfig) -> Result<Self, HandoverError> {
        let engine = IptablesEngine::from_config(&config.engine).map_err(HandoverError::EngineUnavailable)?;
        Self::builder(config.namespace.clone(), config.incoming_port)
            .port_range(config.port_range)
            .chains(config.chains)
            .rule_engine(Arc::new(engine))
            .build()
    }

    pub fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    /// Current rules of the namespace, in deletion order.
    pub fn rules(&self) -> Result<Vec<Rule>, HandoverError> {
        Ok(self.settings.store().discover()?)
    }

    /// Claim a private port for the new generation.
    ///
    /// No traffic reaches the returned listener until the returned
    /// [`Finalizer`] runs.
    pub fn begin(&self) -> Result<(TcpListener, Finalizer), HandoverError> {
        let settings = &self.settings;
        let span = stage_span(&settings.namespace, Stage::Start);
        let _enter = span.enter();

        let rules = settings.store().discover()?;
        if !rules.is_empty() {
            tracing::info!(rules = %RuleList(&rules), count = rules.len(), "Existing rules found");
        }

        let in_use: BTreeSet<u16> = rules.iter().map(|r| r.port).collect();
        let allocation = PortAllocator::new(settings.port_range, Arc::clone(&settings.binder))
            .allocate(&in_use)?;

        tracing::info!(
            port = allocation.port,
            attempts = allocation.attempts,
            "Port allocated"
        );

        let finalizer = Finalizer {
            settings: Arc::clone(settings),
            port: allocation.port,
            pid: std::process::id(),
        };
        Ok((allocation.listener, finalizer))
    }

    /// Delete every rule of the namespace, stopping at the first failure.
    ///
    /// Never signals processes. Returns the number of rules removed.
    pub fn cleanup(&self) -> Result<usize, HandoverError> {
        let settings = &self.settings;
        let span = stage_span(&settings.namespace, Stage::Cleanup);
        let _enter = span.enter();

        let rules = settings.store().discover()?;
        for rule in &rules {
            tracing::info!(rule = %rule, "Deleting rule");
            settings
                .engine
                .delete(rule.chain, rule.rule_number)
                .map_err(|source| HandoverError::CleanupDelete { rule: rule.clone(), source })?;
        }

        tracing::info!(deleted = rules.len(), "Cleanup complete");
        Ok(rules.len())
    }
}

/// Builder for [`Handover`]; validation happens in [`build`](Self::build).
pub struct HandoverBuilder {
    namespace: String,
    incoming_port: u16,
    port_range: PortRange,
    chains: ChainSet,
    engine: Option<Arc<dyn RuleEngine>>,
    signals: Option<Arc<dyn SignalSink>>,
    binder: Option<Arc<dyn PortBinder>>,
}

impl HandoverBuilder {
    pub fn port_range(mut self, range: PortRange) -> Self {
        self.port_range = range;
        self
    }

    pub fn chains(mut self, chains: ChainSet) -> Self {
        self.chains = chains;
        self
    }

    pub fn rule_engine(mut self, engine: Arc<dyn RuleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Defaults to [`SigtermSink`].
    pub fn signal_sink(mut self, signals: Arc<dyn SignalSink>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Defaults to [`TcpBinder`].
    pub fn port_binder(mut self, binder: Arc<dyn PortBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Validate and build. Without an explicit rule engine, `iptables` is
    /// looked up on PATH.
    pub fn build(self) -> Result<Handover, HandoverError> {
        validate_settings(&self.namespace, self.incoming_port, self.port_range, self.chains)
            .map_err(HandoverError::Config)?;

        let engine: Arc<dyn RuleEngine> = match self.engine {
            Some(engine) => engine,
            None => Arc::new(IptablesEngine::direct("iptables").map_err(HandoverError::EngineUnavailable)?),
        };
        let signals: Arc<dyn SignalSink> = match self.signals {
            Some(signals) => signals,
            None => Arc::new(SigtermSink),
        };
        let binder: Arc<dyn PortBinder> = match self.binder {
            Some(binder) => binder,
            None => Arc::new(TcpBinder),
        };

        Ok(Handover {
            settings: Arc::new(Settings {
                namespace: self.namespace,
                incoming_port: self.incoming_port,
                port_range: self.port_range,
                chains: self.chains,
                engine,
                signals,
                binder,
            }),
        })
    }
}

/// Outcome of a successful finalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Port now receiving traffic.
    pub port: u16,
    pub rules_deleted: usize,
    pub delete_failures: usize,
    pub processes_signaled: usize,
    pub signal_failures: usize,
}

/// A bound, not yet routed handover.
#[derive(Debug)]
pub struct Finalizer {
    settings: Arc<Settings>,
    port: u16,
    pid: u32,
}

impl Finalizer {
    /// The private port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Route traffic to this generation and retire the previous ones.
    ///
    /// Call once the server is accepting on the listener from
    /// [`Handover::begin`]. Insertion happens before discovery, discovery
    /// before deletion, deletion before signaling, so at no point is the
    /// incoming port left without a rule.
    pub fn finalize(self) -> Result<FinalizeReport, HandoverError> {
        let settings = &self.settings;
        let span = stage_span(&settings.namespace, Stage::Finalize);
        let _enter = span.enter();

        self.install()?;
        tracing::info!(
            chains = %settings.chain_names(),
            incoming_port = settings.incoming_port,
            port = self.port,
            "Installed redirect rule"
        );

        let rules = settings.store().discover()?;
        let mut report = FinalizeReport { port: self.port, ..FinalizeReport::default() };

        // Best effort from here on: traffic already reaches us.
        let mut kill_set = BTreeSet::new();
        for rule in rules.iter().filter(|r| r.port != self.port) {
            match settings.engine.delete(rule.chain, rule.rule_number) {
                Ok(()) => report.rules_deleted += 1,
                Err(e) => {
                    tracing::warn!(rule = %rule, error = %e, "Failed to delete stale rule");
                    report.delete_failures += 1;
                }
            }
            kill_set.insert(rule.pid);
        }

        for pid in kill_set {
            if pid == self.pid {
                tracing::warn!(pid, "Stale rule owned by this process, not signaling");
                continue;
            }
            match settings.signals.terminate(pid) {
                Ok(()) => report.processes_signaled += 1,
                Err(e) => {
                    tracing::warn!(pid, error = %e, "Failed to signal process");
                    report.signal_failures += 1;
                }
            }
        }

        tracing::info!(
            rules_deleted = report.rules_deleted,
            processes_signaled = report.processes_signaled,
            "Handover complete"
        );
        Ok(report)
    }

    /// Insert the new rule at the head of every enabled chain.
    fn install(&self) -> Result<(), HandoverError> {
        let settings = &self.settings;
        let redirect = Redirect {
            incoming_port: settings.incoming_port,
            target_port: self.port,
            tag: RuleTag::new(settings.namespace.clone(), self.port, self.pid),
        };

        let mut installed: Vec<Chain> = Vec::new();
        for chain in settings.chains.iter() {
            if let Err(source) = settings.engine.insert(chain, &redirect) {
                if !installed.is_empty() {
                    tracing::error!(
                        failed = %chain,
                        already_installed = ?installed,
                        "Partial install; rules in other chains were left in place"
                    );
                }
                return Err(HandoverError::RuleInstall { chain, source });
            }
            installed.push(chain);
        }
        Ok(())
    }
}
