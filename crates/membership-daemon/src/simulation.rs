//! In-process simulation of a whole group over `SimNetwork`.
//!
//! Node `n` uses endpoint `n:0`; node 1 is the introducer. Nodes start one
//! per tick in id order, so node `n` starts at tick `n - 1`. Each tick every
//! started node drains its queue and ticks, in id order. A node can be marked
//! failed at a chosen tick to watch the others evict it.

use std::collections::BTreeMap;
use std::sync::Arc;

use membership_core::{
    Endpoint, EventBus, NetworkStats, Phase, ProtocolConfig, ProtocolEngine, SimNetwork,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("A simulation needs at least one node")]
    NoNodes,

    #[error("Node {node} does not exist (simulating {nodes} nodes)")]
    NoSuchNode { node: u32, nodes: u32 },

    #[error(transparent)]
    Engine(#[from] membership_core::EngineError),
}

/// Injected failure: mark `node` failed at tick `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    pub node: u32,
    pub at: i64,
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub nodes: u32,
    pub ticks: i64,
    pub protocol: ProtocolConfig,
    pub drop_rate: f64,
    pub failure: Option<FailurePlan>,
    /// Seeds the network and every node's gossip order
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: 10,
            ticks: 60,
            protocol: ProtocolConfig::default(),
            drop_rate: 0.0,
            failure: None,
            seed: 0,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: i64,
    pub converged: bool,
    /// First tick at which every running node's view matched the running set
    pub converged_at: Option<i64>,
    pub failed: Vec<Endpoint>,
    /// Each node's membership view at the end of the run
    pub views: BTreeMap<Endpoint, Vec<Endpoint>>,
    pub sent: u64,
    pub dropped: u64,
}

/// A group of engines sharing one in-memory network.
pub struct Simulation {
    config: SimulationConfig,
    network: SimNetwork,
    nodes: Vec<ProtocolEngine>,
    started: usize,
    now: i64,
    converged_at: Option<i64>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, events: Arc<EventBus>) -> Result<Self, SimulationError> {
        if config.nodes == 0 {
            return Err(SimulationError::NoNodes);
        }
        if let Some(plan) = config.failure {
            if plan.node == 0 || plan.node > config.nodes {
                return Err(SimulationError::NoSuchNode {
                    node: plan.node,
                    nodes: config.nodes,
                });
            }
        }

        let mut network = SimNetwork::with_seed(config.seed);
        network.set_drop_rate(config.drop_rate);

        let nodes = (1..=config.nodes)
            .map(|id| {
                ProtocolEngine::new(Endpoint::new(id, 0), &config.protocol, Arc::clone(&events))
                    .map(|engine| engine.with_seed(config.seed.wrapping_add(id as u64)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            network,
            nodes,
            started: 0,
            now: 0,
            converged_at: None,
        })
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn nodes(&self) -> &[ProtocolEngine] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> Option<&ProtocolEngine> {
        self.nodes.get((id as usize).checked_sub(1)?)
    }

    pub fn stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Advance the whole group by one tick.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        let now = self.now;

        if self.started < self.nodes.len() {
            let node = &mut self.nodes[self.started];
            if node.phase() == Phase::Failed {
                debug!("Tick {}: {} failed before its start", now, node.local());
            } else {
                node.start(Endpoint::introducer(), &mut self.network, now)?;
                debug!("Tick {}: started {}", now, node.local());
            }
            self.started += 1;
        }

        if let Some(plan) = self.config.failure {
            if plan.at == now {
                if let Some(node) = self.nodes.get_mut(plan.node as usize - 1) {
                    info!("Tick {}: failing {}", now, node.local());
                    node.mark_failed();
                    self.network.isolate(node.local());
                }
            }
        }

        for node in self.nodes.iter_mut().take(self.started) {
            if node.recv_loop(&mut self.network) {
                node.tick(now, &mut self.network);
            }
        }

        if self.converged_at.is_none() && self.is_converged() {
            info!("Tick {}: membership converged", now);
            self.converged_at = Some(now);
        }

        self.now += 1;
        Ok(())
    }

    /// Run every remaining tick and summarize.
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        while self.now < self.config.ticks {
            self.step()?;
        }
        Ok(self.report())
    }

    /// Whether every running member's view equals the set of other running nodes.
    ///
    /// False until every node has started and joined.
    pub fn is_converged(&self) -> bool {
        if self.started < self.nodes.len() {
            return false;
        }
        let running: Vec<Endpoint> = self
            .nodes
            .iter()
            .filter(|n| n.phase() != Phase::Failed)
            .map(|n| n.local())
            .collect();

        self.nodes
            .iter()
            .filter(|n| n.phase() != Phase::Failed)
            .all(|node| {
                let expected: Vec<Endpoint> = running
                    .iter()
                    .copied()
                    .filter(|e| *e != node.local())
                    .collect();
                node.is_member() && node.table().endpoints() == expected
            })
    }

    pub fn report(&self) -> SimulationReport {
        let stats = self.network.stats();
        SimulationReport {
            ticks: self.now,
            converged: self.is_converged(),
            converged_at: self.converged_at,
            failed: self
                .nodes
                .iter()
                .filter(|n| n.phase() == Phase::Failed)
                .map(|n| n.local())
                .collect(),
            views: self
                .nodes
                .iter()
                .map(|n| (n.local(), n.table().endpoints()))
                .collect(),
            sent: stats.sent,
            dropped: stats.dropped,
        }
    }
}
