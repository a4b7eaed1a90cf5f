//! Drive a connection pool with concurrent clients and report how it behaved.

use crate::config::CliConfig;
use anyhow::{anyhow, Context};
use clap::Args;
use lion_pool::tcp::{ping, PingServer, TcpConnector};
use lion_pool::{Pool, PoolStats};
use log::{info, warn};
use serde::Serialize;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Arguments for the exercise command
#[derive(Args, Debug)]
pub struct ExerciseArgs {
    /// Server address, overriding the config file
    #[clap(long)]
    pub addr: Option<SocketAddr>,

    /// Start an in-process PING/PONG server on the address first
    #[clap(long)]
    pub spawn_server: bool,

    /// Connections opened when the pool is built
    #[clap(long)]
    pub initial: Option<usize>,

    /// Maximum idle connections kept by the pool
    #[clap(long)]
    pub max: Option<usize>,

    /// Number of concurrent clients
    #[clap(long, default_value_t = 20)]
    pub clients: usize,

    /// Acquire/ping/release cycles per client
    #[clap(long, default_value_t = 10)]
    pub rounds: usize,

    /// Skip the liveness check on idle connections
    #[clap(long)]
    pub no_validate: bool,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Outcome of an exercise run
#[derive(Debug, Serialize)]
pub struct ExerciseReport {
    /// Server the pool connected to
    pub addr: SocketAddr,

    /// Number of concurrent clients
    pub clients: usize,

    /// Cycles per client
    pub rounds: usize,

    /// Successful PING/PONG exchanges
    pub pings_ok: usize,

    /// Exchanges that failed and had their connection closed
    pub ping_failures: usize,

    /// Idle connections once every client finished
    pub idle_before_destroy: usize,

    /// Idle connections after the pool was destroyed
    pub idle_after_destroy: usize,

    /// Pool counters at the end of the run
    pub stats: PoolStats,
}

#[derive(Debug, Default)]
struct Tally {
    ok: AtomicUsize,
    failed: AtomicUsize,
}

/// Run the exercise and print its report
pub fn execute(args: &ExerciseArgs, config: &CliConfig) -> anyhow::Result<()> {
    let mut settings = config.pool.clone();
    if let Some(initial) = args.initial {
        settings.initial_size = initial;
    }
    if let Some(max) = args.max {
        settings.max_size = max;
    }
    if args.no_validate {
        settings.validate_on_get = false;
    }

    let addr = args.addr.unwrap_or(config.server.addr);
    let server = if args.spawn_server {
        let server =
            PingServer::bind(addr).with_context(|| format!("failed to bind {}", addr))?;
        Some(server)
    } else {
        None
    };
    let target = server.as_ref().map_or(addr, PingServer::local_addr);

    let pool = TcpConnector::new(target)
        .with_connect_timeout(config.server.connect_timeout())
        .with_io_timeout(config.server.io_timeout())
        .into_pool(settings.pool_config(), settings.validate_on_get)
        .with_context(|| format!("failed to create connection pool for {}", target))?;

    info!(
        "Exercising pool against {} with {} clients x {} rounds",
        target, args.clients, args.rounds
    );

    let tally = run_clients(&pool, args.clients, args.rounds)?;
    let idle_before_destroy = pool.len();
    pool.destroy();

    let report = ExerciseReport {
        addr: target,
        clients: args.clients,
        rounds: args.rounds,
        pings_ok: tally.ok.load(Ordering::Relaxed),
        ping_failures: tally.failed.load(Ordering::Relaxed),
        idle_before_destroy,
        idle_after_destroy: pool.len(),
        stats: pool.stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(server) = server {
        server.shutdown();
    }
    Ok(())
}

fn run_clients(pool: &Pool<TcpStream>, clients: usize, rounds: usize) -> anyhow::Result<Tally> {
    let tally = Tally::default();
    let shared = &tally;

    thread::scope(|s| {
        let handles: Vec<_> = (0..clients)
            .map(|_| s.spawn(move || run_client(pool, rounds, shared)))
            .collect();

        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| anyhow!("client thread panicked"))?
        })
    })?;

    Ok(tally)
}

fn run_client(pool: &Pool<TcpStream>, rounds: usize, tally: &Tally) -> anyhow::Result<()> {
    for _ in 0..rounds {
        let mut conn = pool.acquire().context("failed to acquire connection")?;

        match ping(&mut conn) {
            Ok(()) => {
                tally.ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Ping failed, closing connection: {}", e);
                tally.failed.fetch_add(1, Ordering::Relaxed);
                TcpConnector::close(conn.detach());
            }
        }
    }
    Ok(())
}

fn print_report(report: &ExerciseReport) {
    let stats = &report.stats;

    println!("Exercised pool against {}", report.addr);
    println!("  clients: {}, rounds: {}", report.clients, report.rounds);
    println!(
        "  pings ok: {}, failures: {}",
        report.pings_ok, report.ping_failures
    );
    println!("  idle before destroy: {}", report.idle_before_destroy);
    println!("  idle after destroy: {}", report.idle_after_destroy);
    println!(
        "  created: {}, reused: {}, discarded: {}, returned: {}, disposed: {}",
        stats.created, stats.reused, stats.discarded, stats.returned, stats.disposed
    );
}
