//! Splits one block's reward pot among the active validator set's stakers.
//!
//! Every division here is integer floor division over `U256`; there is no
//! rounding, no remainder tracking across terms, and the residue lost to
//! truncation at each step is simply gone, not carried forward anywhere.
//! That mirrors the original distribution math exactly and is treated as
//! acceptable dust rather than a bug to fix.

use alloy_primitives::{Address, U256};
use log::debug;

use crate::model::{BLOCK_SUBSIDY, PERCENT_DENOM, TOKEN_DENOM};
use crate::store::{BlockTxn, StoreError};

/// Folds the block's collected gas and the fixed block subsidy into the
/// carried-over reward pot, then either distributes the result across the
/// active validator set's stakers or, if there is no active set yet, lets
/// the whole pot carry over untouched to the next distribution.
pub async fn distribute(txn: &mut BlockTxn<'_>, height: u64, block_gas: U256) -> Result<(), StoreError> {
    let carried = txn.load_pending_reward_pot().await?;
    let total_rewards = carried + block_gas + BLOCK_SUBSIDY;

    let epoch = txn.load_latest_epoch_info().await?;
    let validators = epoch.map(|e| e.validators).unwrap_or_default();

    if validators.is_empty() {
        debug!("no active validator set at height {height}, carrying {total_rewards} forward");
        txn.save_pending_reward_pot(total_rewards).await?;
        return Ok(());
    }

    let per_validator = total_rewards / U256::from(validators.len() as u64);

    for consensus_address in validators {
        distribute_to_validator(txn, consensus_address, per_validator, height).await?;
    }

    // The residue from each floor division above, plus whatever was left
    // of `total_rewards` after `per_validator * len` was handed out, is
    // discarded rather than rolled forward.
    txn.save_pending_reward_pot(U256::ZERO).await?;
    Ok(())
}

async fn distribute_to_validator(
    txn: &mut BlockTxn<'_>,
    consensus_address: Address,
    per_validator: U256,
    height: u64,
) -> Result<(), StoreError> {
    let Some(validator) = txn.load_validator(consensus_address).await? else {
        // The active epoch names a validator this store never recorded a
        // `CreateValidator` for. That's the same class of inconsistency as
        // any other missing-validator invariant violation, not a
        // degenerate-but-legal state: surface it rather than silently
        // under-distributing the reward pot.
        return Err(StoreError::ValidatorNotFound(consensus_address));
    };

    let commission = per_validator * validator.commission / PERCENT_DENOM;
    let stake_pool = per_validator - commission;

    let reward_per_unit = if validator.total_stake.is_zero() {
        U256::ZERO
    } else {
        stake_pool * TOKEN_DENOM / validator.total_stake
    };

    let stakers = txn.load_all_stake_addresses(consensus_address).await?;
    for stake_address in stakers {
        let amount = txn.load_stake_amount(stake_address, consensus_address).await?;
        let mut reward = amount * reward_per_unit / TOKEN_DENOM;
        if stake_address == validator.stake_address {
            reward += commission;
        }
        txn.insert_reward_row(stake_address, height, reward).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_validator_split_floors_instead_of_rounding() {
        let total = U256::from(10u64);
        let validators = U256::from(3u64);
        assert_eq!(total / validators, U256::from(3u64));
    }

    #[test]
    fn commission_then_stake_pool_never_exceeds_per_validator() {
        let per_validator = U256::from(1_000u64);
        let commission_bps = U256::from(2_500u64); // 25%
        let commission = per_validator * commission_bps / PERCENT_DENOM;
        let stake_pool = per_validator - commission;
        assert_eq!(commission, U256::from(250u64));
        assert_eq!(stake_pool, U256::from(750u64));
    }
}
