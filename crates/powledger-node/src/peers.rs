use async_trait::async_trait;
use powledger_core::{Block, ChainExport, PeerClient, PeerError};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Base URL for a peer address; bare `host:port` is reached over plain http.
pub fn peer_url(peer: &str, path: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}

/// Whether two peer addresses name the same node, ignoring scheme defaults
/// and trailing slashes.
pub fn same_node(a: &str, b: &str) -> bool {
    peer_url(a.trim(), "") == peer_url(b.trim(), "")
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    node_address: &'a str,
}

/// reqwest-backed peer transport.
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    fn unavailable(peer: &str, err: impl ToString) -> PeerError {
        PeerError::Unavailable {
            peer: peer.to_string(),
            reason: err.to_string(),
        }
    }

    /// Registers `own_address` with `remote` and returns the remote's chain.
    pub async fn register_with(
        &self,
        remote: &str,
        own_address: &str,
    ) -> Result<ChainExport, PeerError> {
        let res = self
            .http
            .post(peer_url(remote, "/register_node"))
            .json(&RegisterRequest {
                node_address: own_address,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unavailable(remote, e))?;
        res.json::<ChainExport>()
            .await
            .map_err(|e| PeerError::Malformed {
                peer: remote.to_string(),
                reason: e.to_string(),
            })
    }

    /// Posts `block` to every peer's `/add_block`. Failures are logged only.
    pub async fn announce_block(&self, peers: Vec<String>, block: &Block) {
        let mut tasks = JoinSet::new();
        for peer in peers {
            let http = self.http.clone();
            let block = block.clone();
            tasks.spawn(async move {
                let res = http
                    .post(peer_url(&peer, "/add_block"))
                    .json(&block)
                    .send()
                    .await;
                (peer, res)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, Ok(res))) if res.status().is_success() => {
                    debug!(%peer, "block announced");
                }
                Ok((peer, Ok(res))) => {
                    warn!(%peer, status = %res.status(), "peer refused announced block");
                }
                Ok((peer, Err(e))) => warn!(%peer, error = %e, "announce failed"),
                Err(e) => warn!(error = %e, "announce task failed"),
            }
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainExport, PeerError> {
        let res = self
            .http
            .get(peer_url(peer, "/chain"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unavailable(peer, e))?;
        res.json::<ChainExport>()
            .await
            .map_err(|e| PeerError::Malformed {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_url_examples() {
        assert_eq!(peer_url("127.0.0.1:8001", "/chain"), "http://127.0.0.1:8001/chain");
        assert_eq!(peer_url("http://node:8000/", "/chain"), "http://node:8000/chain");
        assert_eq!(
            peer_url("https://node.example", "/add_block"),
            "https://node.example/add_block"
        );
    }

    #[test]
    fn same_node_ignores_spelling() {
        assert!(same_node("127.0.0.1:8000", "http://127.0.0.1:8000"));
        assert!(same_node("http://127.0.0.1:8000/", "127.0.0.1:8000"));
        assert!(!same_node("127.0.0.1:8000", "127.0.0.1:8001"));
        assert!(!same_node("https://127.0.0.1:8000", "127.0.0.1:8000"));
    }
}
