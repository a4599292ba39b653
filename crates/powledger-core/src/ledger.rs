//! Shared node state: the chain behind a single writer lock, the mempool, and
//! the peer set. Every entry point of a node goes through here.

use crate::{
    consensus::ChainExport,
    error::{ChainError, InputError},
    pool::{NewTransaction, TransactionPool},
    mine, Block, BlockRecord, CandidateBlock, Chain, Transaction, ValidationError,
};
use parking_lot::RwLock as SyncRwLock;
use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum MineOutcome {
    NothingToMine,
    Mined(Block),
    /// The tip moved while mining; the drained transactions went back to the pool.
    Stale,
}

/// A candidate built against a snapshot of the tip.
#[derive(Clone, Debug)]
pub struct MiningJob {
    pub candidate: CandidateBlock,
    generation: u64,
}

/// Holds a copy of the drained transactions while a search is in flight. If
/// the mining future is dropped before it commits, the search is told to stop
/// and the transactions go back to the pool.
struct DrainGuard<'a> {
    pool: &'a TransactionPool,
    transactions: Option<Vec<Transaction>>,
    cancel: Arc<AtomicBool>,
}

impl DrainGuard<'_> {
    fn disarm(&mut self) -> Vec<Transaction> {
        self.transactions.take().unwrap_or_default()
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(transactions) = self.transactions.take() {
            warn!(count = transactions.len(), "mining cancelled, re-queueing transactions");
            self.pool.requeue(transactions);
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    chain: RwLock<Chain>,
    pool: TransactionPool,
    peers: SyncRwLock<BTreeSet<String>>,
    /// Bumped under the writer lock on every chain mutation.
    generation: Arc<AtomicU64>,
    difficulty: u32,
}

impl Ledger {
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: RwLock::new(Chain::new(difficulty)),
            pool: TransactionPool::new(),
            peers: SyncRwLock::new(BTreeSet::new()),
            generation: Arc::new(AtomicU64::new(0)),
            difficulty,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Does not take the chain lock.
    pub fn submit_transaction(&self, tx: NewTransaction) -> Result<Transaction, InputError> {
        let tx = self.pool.submit(tx)?;
        info!(author = %tx.author, pending = self.pool.len(), "transaction queued");
        Ok(tx)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pool.pending()
    }

    pub async fn chain_len(&self) -> usize {
        self.chain.read().await.len()
    }

    pub async fn last_block(&self) -> Block {
        self.chain.read().await.last().clone()
    }

    pub async fn snapshot(&self) -> Chain {
        self.chain.read().await.clone()
    }

    /// Length and tip hash, read under one lock acquisition.
    pub async fn tip(&self) -> (usize, String) {
        let chain = self.chain.read().await;
        (chain.len(), chain.last().hash().to_string())
    }

    pub async fn export(&self) -> ChainExport {
        let chain = self.chain.read().await.records();
        ChainExport {
            length: chain.len(),
            chain,
            peers: self.peers(),
        }
    }

    /// Snapshots the tip and drains the pool under the writer lock. `None` when
    /// there is nothing to mine.
    pub async fn prepare_candidate(&self) -> Option<MiningJob> {
        let chain = self.chain.write().await;
        if self.pool.is_empty() {
            return None;
        }
        let last = chain.last();
        let candidate = CandidateBlock::new(
            last.index() + 1,
            last.hash().to_string(),
            self.pool.drain(),
        );
        Some(MiningJob {
            candidate,
            generation: self.generation(),
        })
    }

    /// Appends a mined candidate if it still extends the tip. Anything else
    /// sends its transactions back to the pool.
    pub async fn commit_mined(&self, job: MiningJob, proof: Option<String>) -> MineOutcome {
        let mut chain = self.chain.write().await;
        self.commit_locked(&mut chain, job, proof)
    }

    fn commit_locked(
        &self,
        chain: &mut Chain,
        job: MiningJob,
        proof: Option<String>,
    ) -> MineOutcome {
        let Some(hash) = proof else {
            info!(index = job.candidate.index, "mining interrupted by a new tip");
            self.pool.requeue(job.candidate.transactions);
            return MineOutcome::Stale;
        };
        if let Err(reason) = chain.verify_append(&job.candidate, &hash) {
            warn!(index = job.candidate.index, %reason, "mined block no longer fits the chain");
            self.pool.requeue(job.candidate.transactions);
            return MineOutcome::Stale;
        }
        let block = chain.push_verified(job.candidate, hash).clone();
        self.bump_generation();
        info!(index = block.index(), nonce = block.nonce(), hash = %block.hash(), "block mined");
        MineOutcome::Mined(block)
    }

    /// Full mining workflow. The proof-of-work search runs on a blocking
    /// thread without holding the lock and gives up as soon as the chain moves
    /// or this future is dropped. Drained transactions end up either in the
    /// committed block or back in the pool.
    pub async fn mine_pending(&self) -> MineOutcome {
        let Some(MiningJob {
            mut candidate,
            generation: snapshot,
        }) = self.prepare_candidate().await
        else {
            return MineOutcome::NothingToMine;
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let mut guard = DrainGuard {
            pool: &self.pool,
            transactions: Some(candidate.transactions.clone()),
            cancel: Arc::clone(&cancel),
        };

        let generation = Arc::clone(&self.generation);
        let difficulty = self.difficulty;
        let search = tokio::task::spawn_blocking(move || {
            let proof = mine::mine_interruptible(&mut candidate, difficulty, || {
                cancel.load(Ordering::Acquire) || generation.load(Ordering::Acquire) != snapshot
            });
            (candidate, proof)
        })
        .await;

        let mut chain = self.chain.write().await;
        // No await points past here.
        let drained = guard.disarm();
        match search {
            Ok((candidate, proof)) => self.commit_locked(
                &mut chain,
                MiningJob {
                    candidate,
                    generation: snapshot,
                },
                proof,
            ),
            Err(e) => {
                error!(error = %e, "mining task failed");
                self.pool.requeue(drained);
                MineOutcome::Stale
            }
        }
    }

    /// Validates and appends a block announced by a peer.
    pub async fn accept_block(&self, record: BlockRecord) -> Result<Block, ValidationError> {
        let mut chain = self.chain.write().await;
        match chain.append(record.content, record.hash) {
            Ok(block) => {
                let block = block.clone();
                self.bump_generation();
                info!(index = block.index(), hash = %block.hash(), "accepted block from peer");
                Ok(block)
            }
            Err(reason) => {
                warn!(%reason, "discarded block from peer");
                Err(reason)
            }
        }
    }

    /// Replaces the chain only if it is still at the `(len, tip)` observed
    /// before `candidate` was fetched and `candidate` is strictly longer.
    pub async fn replace_if_unchanged(
        &self,
        expected_len: usize,
        expected_tip: &str,
        candidate: Chain,
    ) -> bool {
        let mut chain = self.chain.write().await;
        if chain.len() != expected_len || chain.last().hash() != expected_tip {
            info!(
                local = chain.len(),
                snapshot = expected_len,
                "local chain advanced during consensus, keeping it"
            );
            return false;
        }
        if candidate.len() <= chain.len() {
            return false;
        }
        info!(from = chain.len(), to = candidate.len(), "replacing chain");
        chain.replace(candidate);
        self.bump_generation();
        true
    }

    /// Rebuilds a peer's dump and adopts it if strictly longer than ours. The
    /// dump's peers are merged either way.
    pub async fn adopt_export(&self, export: ChainExport) -> Result<bool, ChainError> {
        let rebuilt = Chain::from_records(&export.chain, self.difficulty)?;
        let replaced = {
            let mut chain = self.chain.write().await;
            if rebuilt.len() > chain.len() {
                info!(from = chain.len(), to = rebuilt.len(), "adopting chain dump");
                chain.replace(rebuilt);
                self.bump_generation();
                true
            } else {
                false
            }
        };
        self.add_peers(export.peers);
        Ok(replaced)
    }

    /// Stores exactly the supplied address, trimmed. Returns it.
    pub fn register_peer(&self, address: &str) -> Result<String, InputError> {
        let address = address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(InputError::EmptyPeerAddress);
        }
        if self.peers.write().insert(address.to_string()) {
            info!(peer = %address, "peer registered");
        }
        Ok(address.to_string())
    }

    pub fn add_peers<I>(&self, peers: I)
    where
        I: IntoIterator<Item = String>,
    {
        for peer in peers {
            // Empty entries from a peer's list are skipped.
            let _ = self.register_peer(&peer);
        }
    }

    pub fn remove_peer(&self, address: &str) -> bool {
        self.peers.write().remove(address)
    }

    /// Sorted, so iteration order is stable.
    pub fn peers(&self) -> Vec<String> {
        self.peers.read().iter().cloned().collect()
    }
}
