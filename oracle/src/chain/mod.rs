//! The chain adapter is the only component that speaks JSON-RPC. Every other
//! module only ever sees the small domain types defined here, so swapping
//! transports (a different node implementation, a mock for tests) never
//! ripples past this module.

pub mod rpc;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use zion_audit_common::error::{Classify, Severity};

/// A block, reduced to what the applier needs: its height and the ordered
/// hashes of the transactions it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub height: u64,
    pub tx_hashes: Vec<B256>,
}

/// A transaction, reduced to what method dispatch and gas accounting need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub hash: B256,
    pub from: Address,
    pub gas_price: U256,
    pub input: Bytes,
}

/// Whether a transaction's receipt reports success, and how much gas it
/// actually consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReceipt {
    pub success: bool,
    pub gas_used: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("node returned no block at height {0}")]
    MissingBlock(u64),
    #[error("node returned no transaction for hash {0}")]
    MissingTransaction(B256),
    #[error("node returned no receipt for hash {0}")]
    MissingReceipt(B256),
    #[error("eth_call to node-manager contract failed: {0}")]
    Call(String),
    #[error(transparent)]
    Abi(#[from] crate::abi::AbiError),
}

impl Classify for ChainError {
    fn severity(&self) -> Severity {
        match self {
            // A node hiccup or a transient gap between tip and indexed
            // state; worth retrying the same height after a backoff.
            ChainError::Transport(_)
            | ChainError::MissingBlock(_)
            | ChainError::MissingTransaction(_)
            | ChainError::MissingReceipt(_)
            | ChainError::Call(_) => Severity::Transient,
            ChainError::Abi(inner) => inner.severity(),
        }
    }
}

/// Everything the listener and applier need to pull from the chain.
///
/// `sender` is kept as its own operation (rather than folded permanently
/// into `ChainTransaction`) to mirror the conceptual step the core
/// performs of recovering a transaction's signer before dispatch, even
/// though this implementation is able to read it straight off the node's
/// own RPC response instead of redoing ECDSA recovery locally.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Current chain head height.
    async fn tip(&self) -> Result<u64, ChainError>;

    /// The block at `height`, or `ChainError::MissingBlock` if the node
    /// doesn't have it (e.g. it's past the current tip).
    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError>;

    /// Full transaction detail by hash.
    async fn tx(&self, hash: B256) -> Result<ChainTransaction, ChainError>;

    /// Receipt by transaction hash.
    async fn receipt(&self, hash: B256) -> Result<ChainReceipt, ChainError>;

    /// The signing address of a transaction already fetched via `tx`.
    fn sender(&self, tx: &ChainTransaction) -> Address {
        tx.from
    }

    /// The validator set recorded against `id` in the node-manager
    /// contract's epoch table, via `eth_call`.
    async fn get_epoch_info(&self, id: u64) -> Result<Vec<Address>, ChainError>;
}
