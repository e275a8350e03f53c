//! Domain types for the reconstructed staking state.
//!
//! All monetary quantities are arbitrary-precision, non-negative integers.
//! We reuse `alloy_primitives::U256` for this: it is already the type the
//! chain's own values arrive as over JSON-RPC, so no extra conversion layer
//! is needed between the wire and the ledger.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Fraction denominator for `Validator::commission` (1/10000ths).
pub const PERCENT_DENOM: U256 = U256::from_limbs([10_000, 0, 0, 0]);

/// Fixed-point denominator used for per-unit reward precision (10^18).
pub const TOKEN_DENOM: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Fixed per-block mint added to the reward pot.
pub const BLOCK_SUBSIDY: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Minimum number of recorded validators before an epoch may carry a
/// non-empty validator set.
pub const MIN_VALIDATORS_FOR_ROTATION: usize = 4;

/// A validator created via `CreateValidator` and mutated by `Stake`/`UnStake`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub consensus_address: Address,
    pub stake_address: Address,
    pub commission: U256,
    pub total_stake: U256,
    pub self_stake: U256,
}

/// A delegator's (or validator's own) stake position against one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeInfo {
    pub stake_address: Address,
    pub consensus_address: Address,
    pub amount: U256,
}

/// A historical validator set, append-only and keyed by monotonically
/// increasing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochInfo {
    pub id: u64,
    pub validators: Vec<Address>,
}

/// Sum of `gas_price * gas_used` for every transaction seen at a height,
/// regardless of governance relevance or revert status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalGas {
    pub height: u64,
    pub total_gas: U256,
}

/// One distribution row: how much `address` was credited at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRow {
    pub address: Address,
    pub height: u64,
    pub amount: U256,
}

/// Hash of a transaction that has already been applied, scoped to the
/// block currently being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DoneTx {
    pub tx_hash: B256,
    pub height: u64,
}
