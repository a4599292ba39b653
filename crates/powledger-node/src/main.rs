use anyhow::Context;
use clap::Parser;
use powledger_core::{resolve, Ledger};
use powledger_node::{router, AppState, Args, HttpPeerClient};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn, Level};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let ledger = Arc::new(Ledger::new(args.difficulty));
    let peers = HttpPeerClient::new(Duration::from_secs(args.peer_timeout_secs))
        .context("building http client")?;

    for peer in &args.peers {
        ledger.register_peer(peer)?;
    }
    if !args.peers.is_empty() {
        let replaced = resolve(ledger.as_ref(), &peers).await;
        info!(replaced, length = ledger.chain_len().await, "initial sync done");
    }

    let state = AppState {
        ledger,
        peers,
        advertise: args.advertise_address(),
    };
    let app = router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(difficulty = args.difficulty, "powledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
