pub mod api;
pub mod config;
pub mod peers;

pub use api::{router, AppState};
pub use config::Args;
pub use peers::HttpPeerClient;
