pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// How many nonces the interruptible miner tries between stop checks.
pub const STOP_CHECK_INTERVAL: u64 = 1024;
