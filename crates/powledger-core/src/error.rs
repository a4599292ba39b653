use thiserror::Error;

/// A submitted transaction, block or peer address is missing required data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("missing or empty field `{0}`")]
    MissingField(&'static str),
    #[error("peer address must not be empty")]
    EmptyPeerAddress,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Why a block (or a block inside a chain) was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain has no genesis block")]
    EmptyChain,
    #[error("block {index}: previous_hash {found} does not match {expected}")]
    LinkageMismatch {
        index: u64,
        expected: String,
        found: String,
    },
    #[error("block index {found} does not follow {expected}")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("block {index}: hash has fewer than {difficulty} leading zeros")]
    InsufficientWork { index: u64, difficulty: u32 },
    #[error("block {index}: claimed hash does not match block contents")]
    DigestMismatch { index: u64 },
    #[error("genesis block does not match the local genesis")]
    ForeignGenesis,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A peer's chain dump contains a block that fails `append`; nothing of it is kept.
    #[error("chain dump has been tampered with at block {index}: {reason}")]
    TamperedChain {
        index: u64,
        #[source]
        reason: ValidationError,
    },
}

/// Talking to a single peer failed; the peer simply contributes no candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer {peer} unavailable: {reason}")]
    Unavailable { peer: String, reason: String },
    #[error("peer {peer} sent a malformed response: {reason}")]
    Malformed { peer: String, reason: String },
}
