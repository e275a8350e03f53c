//! Alloy-backed [`ChainAdapter`], talking plain JSON-RPC over HTTP.
//!
//! Every method follows the same shape as `DaemonAPI`'s RPC wrappers in the
//! wallet crate this oracle was grown out of: trace-log the call, make it,
//! turn a missing result into a typed error instead of an `Option` the
//! caller has to keep unwrapping.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::{BlockNumberOrTag, BlockTransactionsKind, TransactionInput, TransactionRequest};
use async_trait::async_trait;
use log::trace;

use crate::abi;

use super::{ChainAdapter, ChainBlock, ChainError, ChainReceipt, ChainTransaction};

pub struct AlloyChainAdapter<P> {
    provider: P,
    node_manager_contract: Address,
}

/// Concrete provider type produced by [`AlloyChainAdapter::connect_http`]:
/// a plain `reqwest`-backed HTTP JSON-RPC transport against Ethereum-shaped
/// endpoints.
pub type HttpProvider = alloy_provider::RootProvider<alloy_transport_http::Http<reqwest::Client>>;

impl AlloyChainAdapter<HttpProvider> {
    /// Builds an adapter over a plain HTTP JSON-RPC endpoint.
    pub fn connect_http(rpc_url: &str, node_manager_contract: Address) -> Result<Self, ChainError> {
        let url = reqwest::Url::from_str(rpc_url)
            .map_err(|e| ChainError::Transport(format!("invalid rpc url {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Self {
            provider,
            node_manager_contract,
        })
    }
}

impl<P> AlloyChainAdapter<P>
where
    P: Provider,
{
    pub fn new(provider: P, node_manager_contract: Address) -> Self {
        Self {
            provider,
            node_manager_contract,
        }
    }
}

#[async_trait]
impl<P> ChainAdapter for AlloyChainAdapter<P>
where
    P: Provider + Send + Sync,
{
    async fn tip(&self) -> Result<u64, ChainError> {
        trace!("chain_adapter::tip");
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        trace!("chain_adapter::block({height})");
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(height), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .ok_or(ChainError::MissingBlock(height))?;

        let tx_hashes = block
            .transactions
            .hashes()
            .map(|h| *h)
            .collect::<Vec<B256>>();

        Ok(ChainBlock { height, tx_hashes })
    }

    async fn tx(&self, hash: B256) -> Result<ChainTransaction, ChainError> {
        trace!("chain_adapter::tx({hash})");
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .ok_or(ChainError::MissingTransaction(hash))?;

        Ok(ChainTransaction {
            hash,
            from: tx.from,
            gas_price: U256::from(tx.gas_price.unwrap_or_default()),
            input: tx.input,
        })
    }

    async fn receipt(&self, hash: B256) -> Result<ChainReceipt, ChainError> {
        trace!("chain_adapter::receipt({hash})");
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .ok_or(ChainError::MissingReceipt(hash))?;

        Ok(ChainReceipt {
            success: receipt.status(),
            gas_used: receipt.gas_used as u64,
        })
    }

    async fn get_epoch_info(&self, id: u64) -> Result<Vec<Address>, ChainError> {
        trace!("chain_adapter::get_epoch_info({id})");
        let data = abi::encode_get_epoch_info(id);
        let request = TransactionRequest::default()
            .to(self.node_manager_contract)
            .input(TransactionInput::new(Bytes::from(data)));

        let result = self
            .provider
            .call(&request)
            .await
            .map_err(|e| ChainError::Call(e.to_string()))?;

        Ok(abi::decode_get_epoch_info_return(&result)?)
    }
}
