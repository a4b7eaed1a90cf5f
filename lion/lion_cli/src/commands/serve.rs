//! Run a PING/PONG server for pools to connect to.

use crate::config::CliConfig;
use anyhow::Context;
use clap::Args;
use lion_pool::tcp::PingServer;
use std::net::SocketAddr;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on, overriding the config file
    #[clap(long)]
    pub addr: Option<SocketAddr>,
}

/// Serve until the process is killed
pub fn execute(args: &ServeArgs, config: &CliConfig) -> anyhow::Result<()> {
    let addr = args.addr.unwrap_or(config.server.addr);
    let server = PingServer::bind(addr).with_context(|| format!("failed to bind {}", addr))?;

    println!("Listening on {}", server.local_addr());
    server.join();
    Ok(())
}
