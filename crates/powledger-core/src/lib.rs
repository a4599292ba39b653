use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod pool;

pub use chain::{validate_chain, Chain};
pub use consensus::{resolve, ChainExport, PeerClient};
pub use error::{ChainError, InputError, PeerError, ValidationError};
pub use ledger::{Ledger, MineOutcome};
pub use pool::{NewTransaction, TransactionPool};

/// Seconds since the unix epoch as a float, the timestamp unit used on the wire.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub author: String,
    pub content: String,
    pub timestamp: f64,
}

/// Block contents before a proof has been accepted. The nonce is the only
/// field the miner touches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateBlock {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: f64,
    pub previous_hash: String,
    pub nonce: u64,
}

impl CandidateBlock {
    pub fn new(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            transactions,
            timestamp: now(),
            previous_hash,
            nonce: 0,
        }
    }

    pub fn digest(&self) -> String {
        digest(self)
    }
}

/// Keys are declared in lexicographic order so the JSON encoding is canonical.
#[derive(Serialize)]
struct DigestInput<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: &'a [Transaction],
}

/// SHA-256 over the canonical JSON of the five content fields, hex encoded.
pub fn digest(block: &CandidateBlock) -> String {
    let input = DigestInput {
        index: block.index,
        nonce: block.nonce,
        previous_hash: &block.previous_hash,
        timestamp: block.timestamp,
        transactions: &block.transactions,
    };
    let bytes = serde_json::to_vec(&input).expect("string-keyed struct always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// A block as it travels between nodes: contents plus a claimed hash that has
/// not been checked yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(flatten)]
    pub content: CandidateBlock,
    pub hash: String,
}

/// A block whose hash has been verified and that sits in a [`Chain`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Block {
    #[serde(flatten)]
    content: CandidateBlock,
    hash: String,
}

impl Block {
    /// Index 0, no transactions, fixed timestamp, so every node agrees on it.
    pub fn genesis() -> Self {
        let content = CandidateBlock {
            index: 0,
            transactions: vec![],
            timestamp: 0.0,
            previous_hash: constants::GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
        };
        let hash = content.digest();
        Self { content, hash }
    }

    pub(crate) fn sealed(content: CandidateBlock, hash: String) -> Self {
        Self { content, hash }
    }

    pub fn index(&self) -> u64 {
        self.content.index
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.content.transactions
    }

    pub fn timestamp(&self) -> f64 {
        self.content.timestamp
    }

    pub fn previous_hash(&self) -> &str {
        &self.content.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.content.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn content(&self) -> &CandidateBlock {
        &self.content
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            content: self.content.clone(),
            hash: self.hash.clone(),
        }
    }
}

pub mod pow {
    use super::CandidateBlock;

    pub fn count_leading_zero_hex(hash: &str) -> u32 {
        hash.chars().take_while(|c| *c == '0').count() as u32
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        count_leading_zero_hex(hash) >= difficulty
    }

    /// True iff `claimed_hash` meets the difficulty and is the digest of `block`.
    pub fn validate_proof(block: &CandidateBlock, claimed_hash: &str, difficulty: u32) -> bool {
        meets_difficulty(claimed_hash, difficulty) && claimed_hash == block.digest()
    }
}
