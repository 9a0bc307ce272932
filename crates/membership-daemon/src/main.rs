//! membership-daemon: gossip group membership over UDP, or simulated in-process.

use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use membership_core::{Endpoint, EventBus};
use membership_daemon::{
    AuditLog, DaemonConfig, FailurePlan, Node, Simulation, SimulationConfig,
};

#[derive(Parser, Debug)]
#[command(name = "membership-daemon")]
#[command(about = "Gossip-based group membership daemon")]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one node on a UDP socket
    Run(RunArgs),
    /// Simulate a group of nodes over an in-memory network
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Address to bind the UDP socket to; peers reply to it, so not 0.0.0.0
    #[arg(short, long, default_value = "127.0.0.1:7946")]
    bind: SocketAddrV4,

    /// Introducer address (omit to bootstrap a new group)
    #[arg(short, long)]
    introducer: Option<SocketAddrV4>,

    /// Path to the JSON config file (defaults used if missing)
    #[arg(short, long, default_value = "membership.json")]
    config: PathBuf,

    /// Append membership events as JSON lines to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of nodes
    #[arg(short, long, default_value_t = 10)]
    nodes: u32,

    /// Ticks to run
    #[arg(short, long, default_value_t = 60)]
    ticks: i64,

    /// Node id to mark failed
    #[arg(long)]
    fail_node: Option<u32>,

    /// Tick at which --fail-node fails
    #[arg(long, default_value_t = 20)]
    fail_at: i64,

    /// Probability of dropping each datagram
    #[arg(long, default_value_t = 0.0)]
    drop_rate: f64,

    /// Seed for packet loss and gossip order (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Path to the JSON config file (defaults used if missing)
    #[arg(short, long, default_value = "membership.json")]
    config: PathBuf,

    /// Append membership events as JSON lines to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG; defaults to info (or debug with --verbose)
    let default_filter = if cli.verbose {
        "debug,membership_daemon=debug,membership_core=debug"
    } else {
        "info,membership_daemon=info,membership_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Simulate(args) => simulate(args),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    info!("Starting membership-daemon");
    let config = DaemonConfig::load(&args.config)?;
    let events = Arc::new(EventBus::new());
    let audit = args
        .audit_log
        .as_deref()
        .map(|path| AuditLog::open(path, &events))
        .transpose()?;

    let mut node = Node::bind(args.bind, config, Arc::clone(&events)).await?;
    let introducer = args.introducer.map(Endpoint::from).unwrap_or(node.local());
    node.start(introducer)?;

    info!("Node running. Press Ctrl+C to stop.");
    node.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    if let Some(audit) = audit {
        audit.flush()?;
    }
    info!("Shutting down");
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let config = DaemonConfig::load(&args.config)?;
    let events = Arc::new(EventBus::new());
    let audit = args
        .audit_log
        .as_deref()
        .map(|path| AuditLog::open(path, &events))
        .transpose()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    info!(
        "Simulating {} nodes for {} ticks (seed {})",
        args.nodes, args.ticks, seed
    );

    let mut simulation = Simulation::new(
        SimulationConfig {
            nodes: args.nodes,
            ticks: args.ticks,
            protocol: config.protocol,
            drop_rate: args.drop_rate,
            failure: args.fail_node.map(|node| FailurePlan {
                node,
                at: args.fail_at,
            }),
            seed,
        },
        Arc::clone(&events),
    )?;
    let report = simulation.run()?;

    if let Some(audit) = audit {
        audit.flush()?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
