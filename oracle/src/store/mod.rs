//! Durable state for the reconstructed staking ledger.
//!
//! Persistence is Postgres via `sqlx`, used with its runtime-checked
//! `query`/`query_as` calls rather than the `query!`/`query_as!` macros --
//! the macros need a reachable database (or a prepared `.sqlx` cache) at
//! build time, which this workspace has no way to provide. Bignums and
//! addresses cross the boundary as decimal/checksum strings and are
//! converted by hand; see [`types`].

pub mod types;

use alloy_primitives::{Address, B256, U256};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row, Transaction};
use zion_audit_common::error::{Classify, Severity};

use crate::model::{EpochInfo, Validator};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt column value: {0}")]
    Decode(String),
    #[error("validator {0} not found")]
    ValidatorNotFound(Address),
    #[error("arithmetic underflow applying stake change to {0}")]
    Underflow(Address),
}

impl Classify for StoreError {
    fn severity(&self) -> Severity {
        match self {
            StoreError::Sql(_) => Severity::Transient,
            StoreError::Migration(_) | StoreError::Decode(_) | StoreError::ValidatorNotFound(_) | StoreError::Underflow(_) => {
                Severity::Fatal
            }
        }
    }
}

#[derive(Clone)]
pub struct StateStore {
    pool: PgPool,
}

impl StateStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Wraps an already-migrated pool. Used by integration tests built on
    /// `#[sqlx::test]`, which hands out a fresh, already-migrated scratch
    /// database per test rather than a connection string.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load_track_height(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT height FROM track_height WHERE name = 'height'")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>("height")? as u64),
            // The original seeds this row with height 1 the first time the
            // process observes the chain; we do the same lazily on first read.
            None => Ok(1),
        }
    }

    pub async fn load_latest_epoch_info(&self) -> Result<Option<EpochInfo>, StoreError> {
        let row = sqlx::query("SELECT id, validators FROM epoch_info ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_epoch_info).transpose()
    }

    pub async fn load_validator(&self, consensus_address: Address) -> Result<Option<Validator>, StoreError> {
        let row = sqlx::query(
            "SELECT consensus_address, stake_address, commission, total_stake, self_stake \
             FROM validators WHERE consensus_address = $1",
        )
        .bind(types::address_to_sql(consensus_address))
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_validator).transpose()
    }

    pub async fn validator_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM validators")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    pub async fn load_all_stake_addresses(&self, consensus_address: Address) -> Result<Vec<Address>, StoreError> {
        let rows = sqlx::query("SELECT stake_address FROM stake_info WHERE consensus_address = $1")
            .bind(types::address_to_sql(consensus_address))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| types::address_from_sql(row.try_get::<String, _>("stake_address")?.as_str()))
            .collect()
    }

    pub async fn load_stake_amount(
        &self,
        stake_address: Address,
        consensus_address: Address,
    ) -> Result<U256, StoreError> {
        let row = sqlx::query("SELECT amount FROM stake_info WHERE stake_address = $1 AND consensus_address = $2")
            .bind(types::address_to_sql(stake_address))
            .bind(types::address_to_sql(consensus_address))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => types::u256_from_sql(row.try_get::<String, _>("amount")?.as_str()),
            None => Ok(U256::ZERO),
        }
    }

    /// Sum of every `Rewards` row credited to `address` at or before
    /// `end_height`. Backs the `getrewards` query endpoint.
    pub async fn sum_rewards_up_to(&self, address: Address, end_height: u64) -> Result<U256, StoreError> {
        let rows = sqlx::query("SELECT amount FROM rewards WHERE address = $1 AND height <= $2")
            .bind(types::address_to_sql(address))
            .bind(end_height as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut total = U256::ZERO;
        for row in rows {
            total += types::u256_from_sql(row.try_get::<String, _>("amount")?.as_str())?;
        }
        Ok(total)
    }

    /// Sum of `TotalGas` over every height up to and including `end_height`.
    /// Backs the `getgasfee` query endpoint.
    pub async fn sum_total_gas_up_to(&self, end_height: u64) -> Result<U256, StoreError> {
        let rows = sqlx::query("SELECT total_gas FROM total_gas WHERE height <= $1")
            .bind(end_height as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut total = U256::ZERO;
        for row in rows {
            total += types::u256_from_sql(row.try_get::<String, _>("total_gas")?.as_str())?;
        }
        Ok(total)
    }

    /// Opens the single transaction a whole block's state changes and the
    /// cursor advance that concludes it must land in together.
    pub async fn begin_block(&self) -> Result<BlockTxn<'_>, StoreError> {
        Ok(BlockTxn {
            txn: self.pool.begin().await?,
        })
    }
}

fn row_to_validator(row: sqlx::postgres::PgRow) -> Result<Validator, StoreError> {
    Ok(Validator {
        consensus_address: types::address_from_sql(row.try_get::<String, _>("consensus_address")?.as_str())?,
        stake_address: types::address_from_sql(row.try_get::<String, _>("stake_address")?.as_str())?,
        commission: types::u256_from_sql(row.try_get::<String, _>("commission")?.as_str())?,
        total_stake: types::u256_from_sql(row.try_get::<String, _>("total_stake")?.as_str())?,
        self_stake: types::u256_from_sql(row.try_get::<String, _>("self_stake")?.as_str())?,
    })
}

fn row_to_epoch_info(row: sqlx::postgres::PgRow) -> Result<EpochInfo, StoreError> {
    Ok(EpochInfo {
        id: row.try_get::<i64, _>("id")? as u64,
        validators: types::addresses_from_csv(row.try_get::<String, _>("validators")?.as_str())?,
    })
}

/// All writes belonging to one block, plus the cursor advance that commits
/// them. Dropping this without calling [`BlockTxn::commit`] rolls every
/// write in it back, which is what happens on process crash mid-block: the
/// next start finds the cursor untouched and replays the block from
/// scratch, with `DoneTx` guarding against double-applying anything that
/// had already been marked inside the aborted attempt.
pub struct BlockTxn<'a> {
    txn: Transaction<'a, Postgres>,
}

impl<'a> BlockTxn<'a> {
    pub async fn load_validator(&mut self, consensus_address: Address) -> Result<Option<Validator>, StoreError> {
        let row = sqlx::query(
            "SELECT consensus_address, stake_address, commission, total_stake, self_stake \
             FROM validators WHERE consensus_address = $1 FOR UPDATE",
        )
        .bind(types::address_to_sql(consensus_address))
        .fetch_optional(&mut *self.txn)
        .await?;
        row.map(row_to_validator).transpose()
    }

    /// Inserts a brand-new validator. Whether this overwrites an existing
    /// row on a duplicate `CreateValidator` is decided by the caller: see
    /// `applier::STRICT_DUPLICATE_CREATE_VALIDATOR`.
    pub async fn upsert_validator(&mut self, validator: &Validator) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO validators (consensus_address, stake_address, commission, total_stake, self_stake) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (consensus_address) DO UPDATE SET \
             stake_address = EXCLUDED.stake_address, \
             commission = EXCLUDED.commission, \
             total_stake = EXCLUDED.total_stake, \
             self_stake = EXCLUDED.self_stake",
        )
        .bind(types::address_to_sql(validator.consensus_address))
        .bind(types::address_to_sql(validator.stake_address))
        .bind(types::u256_to_sql(validator.commission))
        .bind(types::u256_to_sql(validator.total_stake))
        .bind(types::u256_to_sql(validator.self_stake))
        .execute(&mut *self.txn)
        .await?;
        Ok(())
    }

    pub async fn validator_count(&mut self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM validators")
            .fetch_one(&mut *self.txn)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    pub async fn load_stake_amount(
        &mut self,
        stake_address: Address,
        consensus_address: Address,
    ) -> Result<U256, StoreError> {
        let row = sqlx::query(
            "SELECT amount FROM stake_info WHERE stake_address = $1 AND consensus_address = $2 FOR UPDATE",
        )
        .bind(types::address_to_sql(stake_address))
        .bind(types::address_to_sql(consensus_address))
        .fetch_optional(&mut *self.txn)
        .await?;
        match row {
            Some(row) => types::u256_from_sql(row.try_get::<String, _>("amount")?.as_str()),
            None => Ok(U256::ZERO),
        }
    }

    pub async fn save_stake_amount(
        &mut self,
        stake_address: Address,
        consensus_address: Address,
        amount: U256,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stake_info (stake_address, consensus_address, amount) VALUES ($1, $2, $3) \
             ON CONFLICT (stake_address, consensus_address) DO UPDATE SET amount = EXCLUDED.amount",
        )
        .bind(types::address_to_sql(stake_address))
        .bind(types::address_to_sql(consensus_address))
        .bind(types::u256_to_sql(amount))
        .execute(&mut *self.txn)
        .await?;
        Ok(())
    }

    /// Every stake address recorded against a validator, including rows
    /// whose amount has been fully unstaked back to zero -- the original
    /// store's lookup never filters those out, and the reward distributor
    /// relies on still seeing them so a delegator's zero-amount row isn't
    /// silently dropped from the validator's roster.
    pub async fn load_all_stake_addresses(&mut self, consensus_address: Address) -> Result<Vec<Address>, StoreError> {
        let rows = sqlx::query("SELECT stake_address FROM stake_info WHERE consensus_address = $1")
            .bind(types::address_to_sql(consensus_address))
            .fetch_all(&mut *self.txn)
            .await?;
        rows.into_iter()
            .map(|row| types::address_from_sql(row.try_get::<String, _>("stake_address")?.as_str()))
            .collect()
    }

    pub async fn load_latest_epoch_info(&mut self) -> Result<Option<EpochInfo>, StoreError> {
        let row = sqlx::query("SELECT id, validators FROM epoch_info ORDER BY id DESC LIMIT 1")
            .fetch_optional(&mut *self.txn)
            .await?;
        row.map(row_to_epoch_info).transpose()
    }

    pub async fn insert_epoch_info(&mut self, epoch: &EpochInfo) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO epoch_info (id, validators) VALUES ($1, $2)")
            .bind(epoch.id as i64)
            .bind(types::addresses_to_csv(&epoch.validators))
            .execute(&mut *self.txn)
            .await?;
        Ok(())
    }

    pub async fn is_done_tx(&mut self, hash: B256) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS present FROM done_tx WHERE hash = $1")
            .bind(hash.to_string())
            .fetch_optional(&mut *self.txn)
            .await?;
        Ok(row.is_some())
    }

    pub async fn mark_done_tx(&mut self, hash: B256, height: u64) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO done_tx (hash, height) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(hash.to_string())
            .bind(height as i64)
            .execute(&mut *self.txn)
            .await?;
        Ok(())
    }

    /// Drops every `DoneTx` row. Safe to call once a block has been fully
    /// applied: the replay guard only needs to cover retries of the block
    /// currently in flight, not the whole of history.
    pub async fn clear_done_tx(&mut self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM done_tx").execute(&mut *self.txn).await?;
        Ok(())
    }

    pub async fn load_total_gas(&mut self, height: u64) -> Result<U256, StoreError> {
        let row = sqlx::query("SELECT total_gas FROM total_gas WHERE height = $1")
            .bind(height as i64)
            .fetch_optional(&mut *self.txn)
            .await?;
        match row {
            Some(row) => types::u256_from_sql(row.try_get::<String, _>("total_gas")?.as_str()),
            None => Ok(U256::ZERO),
        }
    }

    pub async fn save_total_gas(&mut self, height: u64, total_gas: U256) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO total_gas (height, total_gas) VALUES ($1, $2) \
             ON CONFLICT (height) DO UPDATE SET total_gas = EXCLUDED.total_gas",
        )
        .bind(height as i64)
        .bind(types::u256_to_sql(total_gas))
        .execute(&mut *self.txn)
        .await?;
        Ok(())
    }

    /// The carry-over reward pot, a singleton row distinct from the
    /// per-address `rewards` ledger: it holds subsidy that couldn't be
    /// distributed because no validator set was active yet.
    pub async fn load_pending_reward_pot(&mut self) -> Result<U256, StoreError> {
        let row = sqlx::query("SELECT amount FROM accumulated_rewards WHERE name = 'accumulatedRewards'")
            .fetch_optional(&mut *self.txn)
            .await?;
        match row {
            Some(row) => types::u256_from_sql(row.try_get::<String, _>("amount")?.as_str()),
            None => Ok(U256::ZERO),
        }
    }

    pub async fn save_pending_reward_pot(&mut self, amount: U256) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accumulated_rewards (name, amount) VALUES ('accumulatedRewards', $1) \
             ON CONFLICT (name) DO UPDATE SET amount = EXCLUDED.amount",
        )
        .bind(types::u256_to_sql(amount))
        .execute(&mut *self.txn)
        .await?;
        Ok(())
    }

    pub async fn insert_reward_row(&mut self, address: Address, height: u64, amount: U256) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO rewards (address, height, amount) VALUES ($1, $2, $3)")
            .bind(types::address_to_sql(address))
            .bind(height as i64)
            .bind(types::u256_to_sql(amount))
            .execute(&mut *self.txn)
            .await?;
        Ok(())
    }

    /// Advances the cursor and commits. Must be the last call made against
    /// a given block's transaction: every other write in this block only
    /// becomes durable together with this one.
    pub async fn commit(mut self, new_height: u64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO track_height (name, height) VALUES ('height', $1) \
             ON CONFLICT (name) DO UPDATE SET height = EXCLUDED.height",
        )
        .bind(new_height as i64)
        .execute(&mut *self.txn)
        .await?;
        self.txn.commit().await?;
        Ok(())
    }
}
