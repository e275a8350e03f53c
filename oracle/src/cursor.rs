//! The cursor is just the height of the last block whose state transitions
//! are fully durable. There is deliberately no in-memory copy of it: every
//! read goes back to the store, and the only write is the one bundled into
//! the same transaction as the block it advances past (see
//! [`crate::store::BlockTxn::commit`]), so a crash can never leave the
//! cursor ahead of the state it's supposed to describe.

use crate::store::{StateStore, StoreError};

/// Height to resume indexing from: one past the last durably-applied
/// block, or `1` if nothing has ever been applied.
pub async fn load(store: &StateStore) -> Result<u64, StoreError> {
    store.load_track_height().await
}
