//! HTTP surface of a node. Handlers are thin: validation and state changes
//! live in `powledger_core::Ledger`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use powledger_core::{
    resolve, BlockRecord, ChainError, ChainExport, InputError, Ledger, MineOutcome,
    NewTransaction, PeerError, Transaction, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::peers::{same_node, HttpPeerClient};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub peers: HttpPeerClient,
    /// How other nodes reach this one.
    pub advertise: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("block discarded: {0}")]
    Rejected(#[from] ValidationError),
    #[error(transparent)]
    Tampered(#[from] ChainError),
    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Input(InputError::Malformed(rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Input(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Tampered(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Peer(_) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub mined: bool,
    pub index: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockAccepted {
    pub index: u64,
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeerAddress {
    #[serde(default)]
    pub node_address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Registered {
    pub node_address: String,
    pub length: usize,
    pub peers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsensusResponse {
    pub replaced: bool,
    pub length: usize,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn new_transaction(
    State(state): State<AppState>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(tx) = payload?;
    let tx = state.ledger.submit_transaction(tx)?;
    Ok((StatusCode::CREATED, Json(tx)))
}

async fn get_chain(State(state): State<AppState>) -> Json<ChainExport> {
    Json(state.ledger.export().await)
}

async fn pending_tx(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.ledger.pending_transactions())
}

/// Mines pending transactions, makes sure no peer has a longer chain, then
/// announces the new block.
async fn mine(State(state): State<AppState>) -> Json<MineResponse> {
    let block = match state.ledger.mine_pending().await {
        MineOutcome::NothingToMine => {
            return Json(MineResponse {
                mined: false,
                index: None,
                message: "no transactions to mine".to_string(),
            })
        }
        MineOutcome::Stale => {
            return Json(MineResponse {
                mined: false,
                index: None,
                message: "chain moved while mining; transactions re-queued".to_string(),
            })
        }
        MineOutcome::Mined(block) => block,
    };

    if resolve(state.ledger.as_ref(), &state.peers).await {
        info!(index = block.index(), "chain replaced after mining, not announcing");
    } else {
        state
            .peers
            .announce_block(state.ledger.peers(), &block)
            .await;
    }
    Json(MineResponse {
        mined: true,
        index: Some(block.index()),
        message: format!("block #{} mined", block.index()),
    })
}

async fn add_block(
    State(state): State<AppState>,
    payload: Result<Json<BlockRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<BlockAccepted>), ApiError> {
    let Json(record) = payload?;
    let block = state.ledger.accept_block(record).await?;
    Ok((
        StatusCode::CREATED,
        Json(BlockAccepted {
            index: block.index(),
            hash: block.hash().to_string(),
        }),
    ))
}

/// A peer announces itself; it gets our chain back so it can sync.
async fn register_node(
    State(state): State<AppState>,
    payload: Result<Json<PeerAddress>, JsonRejection>,
) -> Result<Json<ChainExport>, ApiError> {
    let Json(peer) = payload?;
    state.ledger.register_peer(&peer.node_address)?;
    Ok(Json(state.ledger.export().await))
}

/// Registers this node with a remote one and adopts the remote's chain.
async fn register_with(
    State(state): State<AppState>,
    payload: Result<Json<PeerAddress>, JsonRejection>,
) -> Result<Json<Registered>, ApiError> {
    let Json(remote) = payload?;
    let remote = remote.node_address.trim();
    if remote.is_empty() {
        return Err(InputError::EmptyPeerAddress.into());
    }

    let export = state.peers.register_with(remote, &state.advertise).await?;
    state.ledger.adopt_export(export).await?;
    let remote = state.ledger.register_peer(remote)?;
    for peer in state.ledger.peers() {
        if same_node(&peer, &state.advertise) {
            state.ledger.remove_peer(&peer);
        }
    }

    Ok(Json(Registered {
        node_address: remote,
        length: state.ledger.chain_len().await,
        peers: state.ledger.peers(),
    }))
}

async fn consensus(State(state): State<AppState>) -> Json<ConsensusResponse> {
    let replaced = resolve(state.ledger.as_ref(), &state.peers).await;
    Json(ConsensusResponse {
        replaced,
        length: state.ledger.chain_len().await,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/new_transaction", post(new_transaction))
        .route("/chain", get(get_chain))
        .route("/mine", get(mine))
        .route("/add_block", post(add_block))
        .route("/register_node", post(register_node))
        .route("/register_with", post(register_with))
        .route("/pending_tx", get(pending_tx))
        .route("/consensus", get(consensus))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
