use crate::{constants::STOP_CHECK_INTERVAL, pow::meets_difficulty, CandidateBlock};

/// Brute force nonces from 0 until the digest has `difficulty` leading zero
/// hex characters. Leaves `candidate.nonce` at the winning value and returns
/// the digest.
pub fn mine(candidate: &mut CandidateBlock, difficulty: u32) -> String {
    candidate.nonce = 0;
    let mut hash = candidate.digest();
    while !meets_difficulty(&hash, difficulty) {
        candidate.nonce = candidate.nonce.wrapping_add(1);
        hash = candidate.digest();
    }
    hash
}

/// Same search as [`mine`], polling `should_stop` every
/// [`STOP_CHECK_INTERVAL`] attempts. On interruption the nonce is reset and
/// `None` is returned.
pub fn mine_interruptible<F>(
    candidate: &mut CandidateBlock,
    difficulty: u32,
    should_stop: F,
) -> Option<String>
where
    F: Fn() -> bool,
{
    candidate.nonce = 0;
    loop {
        if candidate.nonce % STOP_CHECK_INTERVAL == 0 && should_stop() {
            candidate.nonce = 0;
            return None;
        }
        let hash = candidate.digest();
        if meets_difficulty(&hash, difficulty) {
            return Some(hash);
        }
        candidate.nonce = candidate.nonce.wrapping_add(1);
    }
}
