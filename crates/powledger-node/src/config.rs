use clap::Parser;
use powledger_core::constants::DEFAULT_DIFFICULTY;

#[derive(Parser, Debug, Clone)]
#[command(name = "powledger-node")]
#[command(about = "Proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub listen: String,

    /// Leading zero hex characters required in a block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Peer to sync with at startup (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Address other nodes should use to reach this one; defaults to http://<listen>
    #[arg(long)]
    pub advertise: Option<String>,

    /// Timeout for every request made to a peer
    #[arg(long, default_value_t = 5)]
    pub peer_timeout_secs: u64,
}

impl Args {
    pub fn advertise_address(&self) -> String {
        self.advertise
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen))
    }
}
