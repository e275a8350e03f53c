use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use zion_audit_oracle::chain::{ChainAdapter, ChainBlock, ChainError, ChainReceipt, ChainTransaction};

/// A chain adapter backed entirely by in-memory fixtures, for exercising
/// the applier and distributor without a live node or RPC transport.
#[derive(Default)]
pub struct MockChainAdapter {
    blocks: Mutex<HashMap<u64, ChainBlock>>,
    txs: Mutex<HashMap<B256, ChainTransaction>>,
    receipts: Mutex<HashMap<B256, ChainReceipt>>,
    epochs: Mutex<HashMap<u64, Vec<Address>>>,
    tip: Mutex<u64>,
}

impl MockChainAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tip(&self, height: u64) {
        *self.tip.lock().unwrap() = height;
    }

    pub fn push_tx(
        &self,
        height: u64,
        hash: B256,
        from: Address,
        gas_price: U256,
        gas_used: u64,
        success: bool,
        input: Vec<u8>,
    ) {
        self.blocks
            .lock()
            .unwrap()
            .entry(height)
            .or_insert_with(|| ChainBlock {
                height,
                tx_hashes: Vec::new(),
            })
            .tx_hashes
            .push(hash);

        self.txs.lock().unwrap().insert(
            hash,
            ChainTransaction {
                hash,
                from,
                gas_price,
                input: Bytes::from(input),
            },
        );
        self.receipts
            .lock()
            .unwrap()
            .insert(hash, ChainReceipt { success, gas_used });
    }

    pub fn set_epoch(&self, id: u64, validators: Vec<Address>) {
        self.epochs.lock().unwrap().insert(id, validators);
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn tip(&self) -> Result<u64, ChainError> {
        Ok(*self.tip.lock().unwrap())
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .or(Some(ChainBlock {
                height,
                tx_hashes: Vec::new(),
            }))
            .ok_or(ChainError::MissingBlock(height))
    }

    async fn tx(&self, hash: B256) -> Result<ChainTransaction, ChainError> {
        self.txs
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or(ChainError::MissingTransaction(hash))
    }

    async fn receipt(&self, hash: B256) -> Result<ChainReceipt, ChainError> {
        self.receipts
            .lock()
            .unwrap()
            .get(&hash)
            .copied()
            .ok_or(ChainError::MissingReceipt(hash))
    }

    async fn get_epoch_info(&self, id: u64) -> Result<Vec<Address>, ChainError> {
        Ok(self.epochs.lock().unwrap().get(&id).cloned().unwrap_or_default())
    }
}
