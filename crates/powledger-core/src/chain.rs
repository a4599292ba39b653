//! The append-only block sequence and the rules a block or a whole chain must
//! satisfy before it is accepted.

use crate::{
    constants::GENESIS_PREVIOUS_HASH, error::ChainError, pow, Block, BlockRecord, CandidateBlock,
    ValidationError,
};
use tracing::debug;

/// Checks `block` against the tip it claims to extend.
fn check_link(
    last_index: u64,
    last_hash: &str,
    block: &CandidateBlock,
    claimed_hash: &str,
    difficulty: u32,
) -> Result<(), ValidationError> {
    if block.previous_hash != last_hash {
        return Err(ValidationError::LinkageMismatch {
            index: block.index,
            expected: last_hash.to_string(),
            found: block.previous_hash.clone(),
        });
    }
    if block.index != last_index + 1 {
        return Err(ValidationError::IndexMismatch {
            expected: last_index + 1,
            found: block.index,
        });
    }
    if !pow::meets_difficulty(claimed_hash, difficulty) {
        return Err(ValidationError::InsufficientWork {
            index: block.index,
            difficulty,
        });
    }
    if !pow::validate_proof(block, claimed_hash, difficulty) {
        return Err(ValidationError::DigestMismatch { index: block.index });
    }
    Ok(())
}

/// Checks a chain dump for internal consistency without touching it.
///
/// The genesis record only has to be self-consistent; every later block must
/// carry enough work, link to its predecessor and continue the index sequence.
pub fn validate_chain(blocks: &[BlockRecord], difficulty: u32) -> Result<(), ValidationError> {
    let Some(genesis) = blocks.first() else {
        return Err(ValidationError::EmptyChain);
    };
    if genesis.content.index != 0 {
        return Err(ValidationError::IndexMismatch {
            expected: 0,
            found: genesis.content.index,
        });
    }
    if genesis.content.previous_hash != GENESIS_PREVIOUS_HASH {
        return Err(ValidationError::LinkageMismatch {
            index: 0,
            expected: GENESIS_PREVIOUS_HASH.to_string(),
            found: genesis.content.previous_hash.clone(),
        });
    }
    if genesis.hash != genesis.content.digest() {
        return Err(ValidationError::DigestMismatch { index: 0 });
    }

    let mut expected_previous = genesis.hash.as_str();
    let mut last_index = 0;
    for record in &blocks[1..] {
        check_link(
            last_index,
            expected_previous,
            &record.content,
            &record.hash,
            difficulty,
        )?;
        expected_previous = &record.hash;
        last_index = record.content.index;
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Chain {
    /// A chain holding only the genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty,
        }
    }

    /// Rebuilds a chain from a peer's dump by replaying every block through
    /// [`Chain::append`] on top of the local genesis.
    pub fn from_records(records: &[BlockRecord], difficulty: u32) -> Result<Self, ChainError> {
        let mut chain = Self::new(difficulty);
        match records.first() {
            None => {
                return Err(ChainError::TamperedChain {
                    index: 0,
                    reason: ValidationError::EmptyChain,
                })
            }
            Some(genesis) if genesis.hash != chain.last().hash() => {
                return Err(ChainError::TamperedChain {
                    index: 0,
                    reason: ValidationError::ForeignGenesis,
                })
            }
            Some(_) => {}
        }
        for record in &records[1..] {
            chain
                .append(record.content.clone(), record.hash.clone())
                .map_err(|reason| ChainError::TamperedChain {
                    index: record.content.index,
                    reason,
                })?;
        }
        Ok(chain)
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true: a chain always has its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn last(&self) -> &Block {
        // Constructors always seed genesis and nothing removes blocks.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Runs every check `append` would, without mutating the chain.
    pub fn verify_append(
        &self,
        block: &CandidateBlock,
        claimed_hash: &str,
    ) -> Result<(), ValidationError> {
        let last = self.last();
        check_link(
            last.index(),
            last.hash(),
            block,
            claimed_hash,
            self.difficulty,
        )
    }

    /// Seals `block` with `claimed_hash` and pushes it, or leaves the chain
    /// untouched and reports why.
    pub fn append(
        &mut self,
        block: CandidateBlock,
        claimed_hash: String,
    ) -> Result<&Block, ValidationError> {
        self.verify_append(&block, &claimed_hash)?;
        Ok(self.push_verified(block, claimed_hash))
    }

    /// Caller must have run [`Chain::verify_append`] under the same borrow.
    pub(crate) fn push_verified(&mut self, block: CandidateBlock, claimed_hash: String) -> &Block {
        debug!(index = block.index, hash = %claimed_hash, "block appended");
        self.blocks.push(Block::sealed(block, claimed_hash));
        self.last()
    }

    /// Wholesale swap, used only after `other` was rebuilt and validated.
    pub fn replace(&mut self, other: Chain) {
        self.blocks = other.blocks;
    }

    pub fn records(&self) -> Vec<BlockRecord> {
        self.blocks.iter().map(Block::to_record).collect()
    }
}
