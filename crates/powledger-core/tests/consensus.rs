use async_trait::async_trait;
use powledger_core::{
    mine::mine, resolve, validate_chain, BlockRecord, CandidateBlock, Chain, ChainExport, Ledger,
    NewTransaction, PeerClient, PeerError, Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;

const DIFFICULTY: u32 = 2;

/// Answers from a fixed table; unknown peers are unreachable.
#[derive(Default)]
struct StaticPeers {
    exports: HashMap<String, ChainExport>,
}

impl StaticPeers {
    fn with(mut self, peer: &str, export: ChainExport) -> Self {
        self.exports.insert(peer.to_string(), export);
        self
    }
}

#[async_trait]
impl PeerClient for StaticPeers {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainExport, PeerError> {
        self.exports
            .get(peer)
            .cloned()
            .ok_or_else(|| PeerError::Unavailable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

fn build_chain(blocks: usize, tag: &str) -> Chain {
    let mut chain = Chain::new(DIFFICULTY);
    for i in 0..blocks {
        let last = chain.last();
        let mut candidate = CandidateBlock::new(
            last.index() + 1,
            last.hash().to_string(),
            vec![Transaction {
                author: tag.to_string(),
                content: format!("{tag} {i}"),
                timestamp: 1_700_000_000.0 + i as f64,
            }],
        );
        let hash = mine(&mut candidate, DIFFICULTY);
        chain.append(candidate, hash).unwrap();
    }
    chain
}

fn export_of(chain: &Chain) -> ChainExport {
    let records = chain.records();
    ChainExport {
        length: records.len(),
        chain: records,
        peers: vec![],
    }
}

/// A length-`len` export whose last block has been edited after mining.
fn tampered_export(len: usize) -> ChainExport {
    let mut export = export_of(&build_chain(len - 1, "forger"));
    export.chain[len - 1].content.transactions[0].content = "rewritten".to_string();
    assert!(validate_chain(&export.chain, DIFFICULTY).is_err());
    export
}

fn ledger_with_peers(peers: &[&str]) -> Ledger {
    let ledger = Ledger::new(DIFFICULTY);
    for peer in peers {
        ledger.register_peer(peer).unwrap();
    }
    ledger
}

#[tokio::test]
async fn adopts_only_valid_longer_chain_in_any_order() {
    let seven = build_chain(6, "honest");
    let five = tampered_export(5);

    for (first, second) in [("a:1", "b:2"), ("b:2", "a:1")] {
        let client = StaticPeers::default()
            .with(first, export_of(&seven))
            .with(second, five.clone());
        let ledger = ledger_with_peers(&["a:1", "b:2"]);
        assert!(resolve(&ledger, &client).await);
        assert_eq!(ledger.chain_len().await, 7);
        assert_eq!(ledger.snapshot().await.blocks(), seven.blocks());
    }
}

#[tokio::test]
async fn never_adopts_invalid_chain_even_if_longer() {
    let client = StaticPeers::default().with("x:1", tampered_export(9));
    let ledger = ledger_with_peers(&["x:1"]);
    assert!(!resolve(&ledger, &client).await);
    assert_eq!(ledger.chain_len().await, 1);
}

#[tokio::test]
async fn never_shortens_local_chain() {
    let ledger = ledger_with_peers(&["short:1"]);
    for i in 0..3 {
        ledger
            .submit_transaction(NewTransaction {
                author: "local".to_string(),
                content: format!("{i}"),
            })
            .unwrap();
        ledger.mine_pending().await;
    }
    let before = ledger.snapshot().await;

    let client = StaticPeers::default().with("short:1", export_of(&build_chain(1, "peer")));
    assert!(!resolve(&ledger, &client).await);
    assert_eq!(ledger.snapshot().await.blocks(), before.blocks());
}

#[tokio::test]
async fn unreachable_peers_do_not_abort_resolution() {
    let longer = build_chain(3, "good");
    let client = StaticPeers::default().with("up:1", export_of(&longer));
    let ledger = ledger_with_peers(&["down:1", "down:2", "up:1"]);
    assert!(resolve(&ledger, &client).await);
    assert_eq!(ledger.chain_len().await, 4);
}

#[tokio::test]
async fn misreported_length_is_ignored() {
    let mut export = export_of(&build_chain(2, "liar"));
    export.length = 10;
    let client = StaticPeers::default().with("liar:1", export);
    let ledger = ledger_with_peers(&["liar:1"]);
    assert!(!resolve(&ledger, &client).await);
    assert_eq!(ledger.chain_len().await, 1);
}

#[tokio::test]
async fn equal_length_tie_breaks_on_smallest_tip_hash() {
    let a = build_chain(3, "alpha");
    let b = build_chain(3, "beta");
    let expected = if a.last().hash() < b.last().hash() { &a } else { &b };

    for order in [["p:1", "p:2"], ["p:2", "p:1"]] {
        let client = StaticPeers::default()
            .with(order[0], export_of(&a))
            .with(order[1], export_of(&b));
        let ledger = ledger_with_peers(&["p:1", "p:2"]);
        assert!(resolve(&ledger, &client).await);
        assert_eq!(ledger.last_block().await.hash(), expected.last().hash());
    }
}

/// Mines a local block while the peer request is in flight.
struct RacingPeer {
    ledger: Arc<Ledger>,
    export: ChainExport,
}

#[async_trait]
impl PeerClient for RacingPeer {
    async fn fetch_chain(&self, _peer: &str) -> Result<ChainExport, PeerError> {
        self.ledger
            .submit_transaction(NewTransaction {
                author: "local".to_string(),
                content: "mined during consensus".to_string(),
            })
            .unwrap();
        self.ledger.mine_pending().await;
        Ok(self.export.clone())
    }
}

#[tokio::test]
async fn concurrent_local_block_is_not_discarded() {
    let ledger = Arc::new(ledger_with_peers(&["far:1"]));
    let client = RacingPeer {
        ledger: Arc::clone(&ledger),
        export: export_of(&build_chain(4, "remote")),
    };
    assert!(!resolve(ledger.as_ref(), &client).await);
    let local = ledger.snapshot().await;
    assert_eq!(local.len(), 2);
    assert_eq!(
        local.last().transactions()[0].content,
        "mined during consensus"
    );
}

#[tokio::test]
async fn exported_chain_round_trips_through_json() {
    let ledger = Ledger::new(DIFFICULTY);
    for i in 0..2 {
        ledger
            .submit_transaction(NewTransaction {
                author: "a".to_string(),
                content: format!("{i}"),
            })
            .unwrap();
        ledger.mine_pending().await;
    }
    let json = serde_json::to_string(&ledger.export().await).unwrap();
    let export: ChainExport = serde_json::from_str(&json).unwrap();
    let rebuilt = Chain::from_records(&export.chain, DIFFICULTY).unwrap();
    assert_eq!(rebuilt.blocks(), ledger.snapshot().await.blocks());

    let records: Vec<BlockRecord> = rebuilt.records();
    assert_eq!(records, export.chain);
}
