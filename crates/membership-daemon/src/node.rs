//! A single membership node on a real UDP socket.
//!
//! Wraps one `ProtocolEngine` and one `UdpTransport`. Inbound datagrams are
//! handed to the engine as they arrive; the engine ticks on a fixed
//! wall-clock interval.

use std::future::Future;
use std::net::SocketAddrV4;
use std::sync::Arc;

use anyhow::Result;
use membership_core::{Endpoint, EventBus, Phase, ProtocolEngine, TickReport};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::config::DaemonConfig;
use crate::udp::UdpTransport;

/// One daemon-hosted node.
pub struct Node {
    engine: ProtocolEngine,
    transport: UdpTransport,
    config: DaemonConfig,
    now: i64,
}

impl Node {
    /// Bind the socket and build an uninitialized engine for it.
    pub async fn bind(addr: SocketAddrV4, config: DaemonConfig, events: Arc<EventBus>) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::bind(addr).await?;
        let engine = ProtocolEngine::new(transport.local(), &config.protocol, events)?;
        info!("Node {} bound to {}", transport.local(), transport.local().to_socket_addr());

        Ok(Self {
            engine,
            transport,
            config,
            now: 0,
        })
    }

    pub fn local(&self) -> Endpoint {
        self.engine.local()
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// Current logical tick.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Join the group through `introducer`. Pass our own endpoint to bootstrap.
    pub fn start(&mut self, introducer: Endpoint) -> Result<()> {
        self.engine.start(introducer, &mut self.transport, self.now)?;
        Ok(())
    }

    /// Pull in pending datagrams and run one protocol tick.
    pub fn step(&mut self) -> TickReport {
        self.engine.recv_loop(&mut self.transport);
        let report = self.engine.tick(self.now, &mut self.transport);
        if report != TickReport::default() {
            debug!("{}: tick {} {:?}", self.local(), self.now, report);
        }
        self.now += 1;
        report
    }

    /// Tick on the configured interval until `shutdown` resolves, then leave.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "{}: running with {}ms ticks",
            self.local(),
            self.config.tick_interval_ms
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.step();
                }

                Some(data) = self.transport.readable() => {
                    self.engine.deliver(data);
                }

                _ = &mut shutdown => {
                    info!("{}: shutdown signal received", self.local());
                    break;
                }
            }
        }

        self.engine.leave();
        info!("{}: left group after {} ticks", self.local(), self.now);
        Ok(())
    }
}
