//! Longest-valid-chain fork choice across the known peers.

use crate::{chain::validate_chain, error::PeerError, BlockRecord, Chain, Ledger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// What a node hands out from `GET /chain` and `POST /register_node`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainExport {
    pub length: usize,
    pub chain: Vec<BlockRecord>,
    pub peers: Vec<String>,
}

/// Fetches a peer's chain. Transport failures come back as [`PeerError`].
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainExport, PeerError>;
}

/// Turns a peer's export into a usable chain, or explains why it can't be one.
fn qualify(
    peer: &str,
    export: ChainExport,
    local_len: usize,
    difficulty: u32,
) -> Result<Option<Chain>, PeerError> {
    if export.length != export.chain.len() {
        return Err(PeerError::Malformed {
            peer: peer.to_string(),
            reason: format!(
                "reported length {} but sent {} blocks",
                export.length,
                export.chain.len()
            ),
        });
    }
    if export.length <= local_len {
        return Ok(None);
    }
    if let Err(reason) = validate_chain(&export.chain, difficulty) {
        warn!(%peer, %reason, "peer chain failed validation");
        return Ok(None);
    }
    match Chain::from_records(&export.chain, difficulty) {
        Ok(chain) => Ok(Some(chain)),
        Err(e) => {
            warn!(%peer, error = %e, "peer chain could not be rebuilt");
            Ok(None)
        }
    }
}

/// Longer wins; equal lengths go to the lexicographically smaller tip hash.
fn better(candidate: &Chain, best: &Chain) -> bool {
    match candidate.len().cmp(&best.len()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.last().hash() < best.last().hash(),
    }
}

/// Asks every peer for its chain and adopts the best strictly longer valid
/// one. Never shortens the local chain; the swap is skipped if the local
/// chain moved while peers were being queried. Returns whether it replaced.
pub async fn resolve<C>(ledger: &Ledger, client: &C) -> bool
where
    C: PeerClient + ?Sized,
{
    let (local_len, local_tip) = ledger.tip().await;
    let difficulty = ledger.difficulty();
    let mut best: Option<(String, Chain)> = None;

    for peer in ledger.peers() {
        let export = match client.fetch_chain(&peer).await {
            Ok(export) => export,
            Err(e) => {
                warn!(error = %e, "skipping peer");
                continue;
            }
        };
        let chain = match qualify(&peer, export, local_len, difficulty) {
            Ok(Some(chain)) => chain,
            Ok(None) => {
                debug!(%peer, "peer has no better chain");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "skipping peer");
                continue;
            }
        };
        let replace = match &best {
            Some((_, current)) => better(&chain, current),
            None => true,
        };
        if replace {
            best = Some((peer, chain));
        }
    }

    let Some((peer, chain)) = best else {
        return false;
    };
    info!(%peer, length = chain.len(), "found longer valid chain");
    ledger
        .replace_if_unchanged(local_len, &local_tip, chain)
        .await
}
