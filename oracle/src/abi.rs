//! Resolves a transaction's 4-byte method selector and decodes its
//! arguments for the five recognized governance methods.
//!
//! The ABI is process-wide and effectively immutable after startup: the
//! `sol!`-generated call types are zero-sized selector tables, so there is
//! nothing to construct or hold behind a lock the way the Go original's
//! `nmAbi abi.ABI` package global needed to be.

use alloy_primitives::Address;
use alloy_sol_types::{sol, SolCall};
use zion_audit_common::error::{Classify, Severity};

sol! {
    function create_validator(address consensus_address, uint256 commission, uint256 init_stake);
    function stake(address consensus_address, uint256 amount);
    function un_stake(address consensus_address, uint256 amount);
    function end_block();
    function change_epoch();
    function get_epoch_info(uint256 id) returns (address[] validators);
}

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("recognized selector {selector:?} but failed to decode arguments: {source}")]
    Decode {
        selector: [u8; 4],
        #[source]
        source: alloy_sol_types::Error,
    },
}

impl Classify for AbiError {
    fn severity(&self) -> Severity {
        // The ABI drifted from what the chain is producing; an operator
        // must look at this before the block can be replayed.
        Severity::Fatal
    }
}

/// A decoded call to one of the five governance methods this oracle
/// understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceCall {
    CreateValidator {
        consensus_address: Address,
        commission: alloy_primitives::U256,
        init_stake: alloy_primitives::U256,
    },
    Stake {
        consensus_address: Address,
        amount: alloy_primitives::U256,
    },
    UnStake {
        consensus_address: Address,
        amount: alloy_primitives::U256,
    },
    EndBlock,
    ChangeEpoch,
}

/// Decodes `input` (the full calldata, selector included).
///
/// Returns `Ok(None)` for a selector that isn't one of the five recognized
/// governance methods -- that's not an error, the transaction is simply
/// not a governance call and is skipped for state-transition purposes.
pub fn decode(input: &[u8]) -> Result<Option<GovernanceCall>, AbiError> {
    if input.len() < 4 {
        return Ok(None);
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&input[0..4]);

    let call = match selector {
        s if s == create_validatorCall::SELECTOR => {
            let decoded = create_validatorCall::abi_decode(input, true)
                .map_err(|source| AbiError::Decode { selector, source })?;
            GovernanceCall::CreateValidator {
                consensus_address: decoded.consensus_address,
                commission: decoded.commission,
                init_stake: decoded.init_stake,
            }
        }
        s if s == stakeCall::SELECTOR => {
            let decoded = stakeCall::abi_decode(input, true)
                .map_err(|source| AbiError::Decode { selector, source })?;
            GovernanceCall::Stake {
                consensus_address: decoded.consensus_address,
                amount: decoded.amount,
            }
        }
        s if s == un_stakeCall::SELECTOR => {
            let decoded = un_stakeCall::abi_decode(input, true)
                .map_err(|source| AbiError::Decode { selector, source })?;
            GovernanceCall::UnStake {
                consensus_address: decoded.consensus_address,
                amount: decoded.amount,
            }
        }
        s if s == end_blockCall::SELECTOR => GovernanceCall::EndBlock,
        s if s == change_epochCall::SELECTOR => GovernanceCall::ChangeEpoch,
        _ => return Ok(None),
    };

    Ok(Some(call))
}

/// Encodes calldata for each recognized governance method. Exercised by
/// integration tests building synthetic transactions, and usable by any
/// future chain-simulation tooling that needs to construct a well-formed
/// governance transaction's `input` field.
pub fn encode_create_validator(consensus_address: Address, commission: alloy_primitives::U256, init_stake: alloy_primitives::U256) -> Vec<u8> {
    create_validatorCall {
        consensus_address,
        commission,
        init_stake,
    }
    .abi_encode()
}

pub fn encode_stake(consensus_address: Address, amount: alloy_primitives::U256) -> Vec<u8> {
    stakeCall {
        consensus_address,
        amount,
    }
    .abi_encode()
}

pub fn encode_unstake(consensus_address: Address, amount: alloy_primitives::U256) -> Vec<u8> {
    un_stakeCall {
        consensus_address,
        amount,
    }
    .abi_encode()
}

pub fn encode_end_block() -> Vec<u8> {
    end_blockCall {}.abi_encode()
}

pub fn encode_change_epoch() -> Vec<u8> {
    change_epochCall {}.abi_encode()
}

/// ABI-encodes a call to the node-manager contract's `get_epoch_info` view,
/// for use as the `data` field of an `eth_call`.
pub fn encode_get_epoch_info(id: u64) -> Vec<u8> {
    get_epoch_infoCall {
        id: alloy_primitives::U256::from(id),
    }
    .abi_encode()
}

/// Decodes the return data of a `get_epoch_info` call into the active
/// epoch's validator set.
pub fn decode_get_epoch_info_return(data: &[u8]) -> Result<Vec<Address>, AbiError> {
    let selector = get_epoch_infoCall::SELECTOR;
    let decoded = get_epoch_infoCall::abi_decode_returns(data, true).map_err(|source| AbiError::Decode {
        selector,
        source,
    })?;
    Ok(decoded.validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    #[test]
    fn decodes_create_validator() {
        let call = create_validatorCall {
            consensus_address: address!("1111111111111111111111111111111111111111"),
            commission: U256::from(1000u64),
            init_stake: U256::from(1000u64),
        };
        let encoded = call.abi_encode();
        let decoded = decode(&encoded).unwrap().unwrap();
        assert_eq!(
            decoded,
            GovernanceCall::CreateValidator {
                consensus_address: address!("1111111111111111111111111111111111111111"),
                commission: U256::from(1000u64),
                init_stake: U256::from(1000u64),
            }
        );
    }

    #[test]
    fn unrecognized_selector_is_not_an_error() {
        let input = [0xde, 0xad, 0xbe, 0xef, 0x00];
        assert_eq!(decode(&input).unwrap(), None);
    }

    #[test]
    fn end_block_has_no_arguments() {
        let call = end_blockCall {};
        let encoded = call.abi_encode();
        assert_eq!(decode(&encoded).unwrap().unwrap(), GovernanceCall::EndBlock);
    }
}
