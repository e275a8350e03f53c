//! Applies one block's transactions to the staking ledger.
//!
//! This is a pure reducer in spirit: given the same block from the chain
//! and the same prior state, it always produces the same next state. The
//! only side effects are the store writes themselves, all of which land in
//! the single transaction [`crate::store::BlockTxn::commit`] closes out.

use alloy_primitives::{Address, U256};
use log::{debug, warn};
use zion_audit_common::error::{Classify, Severity};

use crate::abi::{self, AbiError, GovernanceCall};
use crate::chain::{ChainAdapter, ChainError};
use crate::distributor;
use crate::model::{EpochInfo, Validator, MIN_VALIDATORS_FOR_ROTATION};
use crate::store::{BlockTxn, StateStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ApplierError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error("duplicate CreateValidator for {0} rejected under strict mode")]
    DuplicateCreateValidator(Address),
    #[error("{0} referenced by Stake/UnStake but was never created")]
    UnknownValidator(Address),
    #[error("stake underflow applying a state transition for {0}")]
    Underflow(Address),
}

impl Classify for ApplierError {
    fn severity(&self) -> Severity {
        match self {
            ApplierError::Chain(e) => e.severity(),
            ApplierError::Store(e) => e.severity(),
            ApplierError::Abi(e) => e.severity(),
            ApplierError::DuplicateCreateValidator(_)
            | ApplierError::UnknownValidator(_)
            | ApplierError::Underflow(_) => Severity::Fatal,
        }
    }
}

/// Applies every transaction in the block at `height`, then advances the
/// cursor past it as the final write of the same transaction. Returns
/// whether an `EndBlock` call was seen, which is also when reward
/// distribution for the block runs.
pub async fn apply_block(
    chain: &dyn ChainAdapter,
    store: &StateStore,
    height: u64,
    strict_duplicate_create_validator: bool,
) -> Result<bool, ApplierError> {
    let block = chain.block(height).await?;
    let mut txn = store.begin_block().await?;

    // Starting a block always resets its gas tally and replay guard. With
    // the whole block committed atomically this is belt-and-suspenders --
    // a crash before commit leaves nothing durable to clean up -- but it
    // keeps this function safe to call again for the same height without
    // assuming anything about what a prior, uncommitted attempt left in
    // memory-only state.
    txn.save_total_gas(height, U256::ZERO).await?;
    txn.clear_done_tx().await?;

    let mut total_gas = U256::ZERO;
    let mut end_block_seen = false;

    for tx_hash in &block.tx_hashes {
        let tx = chain.tx(*tx_hash).await?;
        let receipt = chain.receipt(*tx_hash).await?;

        // Charged unconditionally, even for a hash that reappears later in
        // the same block or that was already applied: the chain collected
        // this gas whether or not the call reverted, was governance
        // relevant, or turns out to be a replay.
        total_gas += tx.gas_price * U256::from(receipt.gas_used);
        txn.save_total_gas(height, total_gas).await?;

        if !receipt.success {
            debug!("tx {} reverted at height {height}, skipping state transition", tx.hash);
            continue;
        }

        if txn.is_done_tx(*tx_hash).await? {
            debug!("tx {} already applied at height {height}, skipping duplicate", tx.hash);
            continue;
        }

        let call = match abi::decode(&tx.input)? {
            Some(call) => call,
            None => {
                txn.mark_done_tx(*tx_hash, height).await?;
                continue;
            }
        };

        let sender = chain.sender(&tx);

        match call {
            GovernanceCall::CreateValidator {
                consensus_address,
                commission,
                init_stake,
            } => {
                apply_create_validator(
                    &mut txn,
                    consensus_address,
                    sender,
                    commission,
                    init_stake,
                    strict_duplicate_create_validator,
                )
                .await?;
            }
            GovernanceCall::Stake {
                consensus_address,
                amount,
            } => {
                apply_stake(&mut txn, consensus_address, sender, amount).await?;
            }
            GovernanceCall::UnStake {
                consensus_address,
                amount,
            } => {
                apply_unstake(&mut txn, consensus_address, sender, amount).await?;
            }
            GovernanceCall::EndBlock => {
                end_block_seen = true;
            }
            GovernanceCall::ChangeEpoch => {
                apply_change_epoch(chain, &mut txn).await?;
            }
        }

        txn.mark_done_tx(*tx_hash, height).await?;
    }

    if end_block_seen {
        distributor::distribute(&mut txn, height, total_gas).await?;
    }

    txn.clear_done_tx().await?;
    txn.commit(height + 1).await?;

    Ok(end_block_seen)
}

async fn apply_create_validator(
    txn: &mut BlockTxn<'_>,
    consensus_address: Address,
    stake_address: Address,
    commission: U256,
    init_stake: U256,
    strict: bool,
) -> Result<(), ApplierError> {
    if txn.load_validator(consensus_address).await?.is_some() {
        if strict {
            return Err(ApplierError::DuplicateCreateValidator(consensus_address));
        }
        warn!("duplicate CreateValidator for {consensus_address}, overwriting prior registration");
    }

    let validator = Validator {
        consensus_address,
        stake_address,
        commission,
        total_stake: init_stake,
        self_stake: init_stake,
    };
    txn.upsert_validator(&validator).await?;
    txn.save_stake_amount(stake_address, consensus_address, init_stake).await?;
    Ok(())
}

async fn apply_stake(
    txn: &mut BlockTxn<'_>,
    consensus_address: Address,
    from: Address,
    amount: U256,
) -> Result<(), ApplierError> {
    let mut validator = txn
        .load_validator(consensus_address)
        .await?
        .ok_or(ApplierError::UnknownValidator(consensus_address))?;

    validator.total_stake += amount;
    if from == validator.stake_address {
        validator.self_stake += amount;
    }
    txn.upsert_validator(&validator).await?;

    let existing = txn.load_stake_amount(from, consensus_address).await?;
    txn.save_stake_amount(from, consensus_address, existing + amount).await?;
    Ok(())
}

async fn apply_unstake(
    txn: &mut BlockTxn<'_>,
    consensus_address: Address,
    from: Address,
    amount: U256,
) -> Result<(), ApplierError> {
    let mut validator = txn
        .load_validator(consensus_address)
        .await?
        .ok_or(ApplierError::UnknownValidator(consensus_address))?;

    validator.total_stake = validator
        .total_stake
        .checked_sub(amount)
        .ok_or(ApplierError::Underflow(consensus_address))?;
    // self_stake is deliberately left untouched here: the chain's own
    // UnStake path never reduces a validator's recorded self-stake even
    // when the unstaking address is the validator itself, and this store
    // keeps that quirk rather than silently correcting it.
    txn.upsert_validator(&validator).await?;

    let existing = txn.load_stake_amount(from, consensus_address).await?;
    let updated = existing.checked_sub(amount).ok_or(ApplierError::Underflow(from))?;
    txn.save_stake_amount(from, consensus_address, updated).await?;
    Ok(())
}

async fn apply_change_epoch(chain: &dyn ChainAdapter, txn: &mut BlockTxn<'_>) -> Result<(), ApplierError> {
    let next_id = txn.load_latest_epoch_info().await?.map(|e| e.id + 1).unwrap_or(1);

    // Below the rotation threshold the chain itself can't have assembled a
    // valid next validator set yet; persist an empty one rather than
    // calling out to the contract for a set that doesn't exist.
    let validators = if (txn.validator_count().await? as usize) < MIN_VALIDATORS_FOR_ROTATION {
        Vec::new()
    } else {
        chain.get_epoch_info(next_id).await?
    };

    txn.insert_epoch_info(&EpochInfo {
        id: next_id,
        validators,
    })
    .await?;
    Ok(())
}
